pub mod alerts;
pub mod city;
pub mod condition;
pub mod errors;
pub mod forecast;
pub mod weather;
