pub mod city_weather;
pub mod detailed_forecast;
pub mod neighbor_cities;
pub mod regional_weather;
