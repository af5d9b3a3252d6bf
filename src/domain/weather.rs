use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::alerts::WeatherAlert;
use crate::domain::condition::{self, classify_condition};
use crate::domain::forecast::{DailyForecast, HourlyForecast};

/// Cloud-cover bands exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudCoverage {
    Clear,
    FewClouds,
    ScatteredClouds,
    BrokenClouds,
    Overcast,
}

impl CloudCoverage {
    #[must_use]
    pub fn from_percentage(clouds: f64) -> Self {
        if clouds <= 10.0 {
            Self::Clear
        } else if clouds <= 25.0 {
            Self::FewClouds
        } else if clouds <= 50.0 {
            Self::ScatteredClouds
        } else if clouds <= 84.0 {
            Self::BrokenClouds
        } else {
            Self::Overcast
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clear => "Céu limpo",
            Self::FewClouds => "Poucas nuvens",
            Self::ScatteredClouds => "Parcialmente nublado",
            Self::BrokenClouds => "Nublado",
            Self::Overcast => "Céu encoberto",
        }
    }
}

/// Aggregated metrics for the target day, combined from hourly and daily
/// forecasts on the regional path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregatedMetrics {
    pub date: String,
    pub rain_volume: f64,
    pub rain_intensity_max: f64,
    pub rain_probability_max: f64,
    pub wind_speed_max: f64,
    pub temp_min: f64,
    pub temp_max: f64,
}

/// Current conditions for a city. A plain aggregate: alert derivation
/// lives in `domain::alerts`, classification in `domain::condition`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub city_id: String,
    pub city_name: String,
    pub timestamp: DateTime<Tz>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub visibility: f64,
    pub clouds: f64,
    pub wind_speed: f64,
    pub wind_direction: u16,
    pub rain_probability: f64,
    pub rain_1h: f64,
    pub rain_accumulated_day: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub is_day: bool,
    pub weather_code: u16,
    pub description: String,
    pub weather_alert: Vec<WeatherAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_aggregates: Option<DailyAggregatedMetrics>,
}

impl Weather {
    /// Finalize construction: classify the condition from the derived
    /// metrics (regardless of what any provider reported) and restore the
    /// `temp_min <= temperature <= temp_max` invariant.
    #[must_use]
    pub fn build(fields: Self) -> Self {
        let mut entity = fields;

        let (code, description) = classify_condition(
            condition::rainfall_intensity(entity.rain_probability, entity.rain_1h),
            entity.rain_1h,
            entity.wind_speed,
            entity.clouds,
            entity.visibility,
            entity.temperature,
            entity.rain_probability,
        );
        entity.weather_code = code;
        entity.description = description.to_string();

        if entity.temp_min == 0.0 && entity.temp_max == 0.0 {
            entity.temp_min = entity.temperature;
            entity.temp_max = entity.temperature;
        } else {
            entity.temp_min = entity.temp_min.min(entity.temperature);
            entity.temp_max = entity.temp_max.max(entity.temperature);
        }

        entity
    }

    /// Composite rainfall intensity rounded to an integer score 0-100.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rainfall_intensity(&self) -> i64 {
        condition::rainfall_intensity(self.rain_probability, self.rain_1h).round() as i64
    }

    #[must_use]
    pub fn clouds_description(&self) -> &'static str {
        CloudCoverage::from_percentage(self.clouds).label()
    }
}

/// Consolidated single-city extended view: current conditions plus the
/// 16-day and 168-hour outlooks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedForecast {
    pub city_id: String,
    pub city_name: String,
    pub city_state: String,
    pub current_weather: Weather,
    pub daily_forecasts: Vec<DailyForecast>,
    pub hourly_forecasts: Vec<HourlyForecast>,
    pub extended_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::SAO_PAULO;
    use chrono::TimeZone;

    fn sample_weather() -> Weather {
        Weather {
            city_id: "3543204".to_string(),
            city_name: "Ribeirão do Sul".to_string(),
            timestamp: SAO_PAULO
                .with_ymd_and_hms(2026, 3, 10, 14, 0, 0)
                .single()
                .expect("valid timestamp"),
            temperature: 27.0,
            feels_like: 28.5,
            humidity: 65.0,
            pressure: 1013.0,
            visibility: 10_000.0,
            clouds: 30.0,
            wind_speed: 12.0,
            wind_direction: 120,
            rain_probability: 10.0,
            rain_1h: 0.0,
            rain_accumulated_day: 0.0,
            temp_min: 19.0,
            temp_max: 30.0,
            is_day: true,
            weather_code: 0,
            description: String::new(),
            weather_alert: Vec::new(),
            daily_aggregates: None,
        }
    }

    #[test]
    fn build_classifies_and_keeps_temp_invariant() {
        let weather = Weather::build(sample_weather());
        assert_eq!(weather.description, "Parcialmente nublado");
        assert!(weather.temp_min <= weather.temperature);
        assert!(weather.temperature <= weather.temp_max);
    }

    #[test]
    fn build_widens_temp_bounds_when_needed() {
        let mut fields = sample_weather();
        fields.temperature = 33.0;
        fields.temp_max = 30.0;
        let weather = Weather::build(fields);
        assert_eq!(weather.temp_max, 33.0);
    }

    #[test]
    fn build_fills_missing_temp_bounds_from_temperature() {
        let mut fields = sample_weather();
        fields.temp_min = 0.0;
        fields.temp_max = 0.0;
        let weather = Weather::build(fields);
        assert_eq!(weather.temp_min, weather.temperature);
        assert_eq!(weather.temp_max, weather.temperature);
    }

    #[test]
    fn rainfall_intensity_rounds_composite_score() {
        let mut fields = sample_weather();
        fields.rain_1h = 15.0;
        fields.rain_probability = 50.0;
        let weather = Weather::build(fields);
        assert_eq!(weather.rainfall_intensity(), 25);
    }

    #[test]
    fn clouds_description_bands() {
        let mut fields = sample_weather();
        for (clouds, label) in [
            (5.0, "Céu limpo"),
            (20.0, "Poucas nuvens"),
            (40.0, "Parcialmente nublado"),
            (70.0, "Nublado"),
            (95.0, "Céu encoberto"),
        ] {
            fields.clouds = clouds;
            assert_eq!(Weather::build(fields.clone()).clouds_description(), label);
        }
    }
}
