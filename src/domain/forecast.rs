#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::condition::classify_condition;

/// Every user-visible timestamp in the service is America/Sao_Paulo.
pub const SAO_PAULO: Tz = chrono_tz::America::Sao_Paulo;

/// Parse an upstream forecast timestamp.
///
/// Accepts `YYYY-MM-DDTHH:MM` (naive, assumed America/Sao_Paulo since the
/// providers are queried with that timezone) and the same shapes carrying
/// an explicit offset or seconds.
#[must_use]
pub fn parse_forecast_timestamp(value: &str) -> Option<DateTime<Tz>> {
    for format in ["%Y-%m-%dT%H:%M%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&SAO_PAULO));
        }
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return SAO_PAULO.from_local_datetime(&naive).single();
        }
    }
    None
}

/// Materialize a `YYYY-MM-DD` date at local midnight, America/Sao_Paulo.
#[must_use]
pub fn date_start_of_day(date: &str) -> Option<DateTime<Tz>> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    SAO_PAULO
        .from_local_datetime(&parsed.and_hms_opt(0, 0, 0)?)
        .single()
}

/// One hour of forecast. Timestamps keep the upstream ISO-8601 string so
/// offsets survive the round trip to clients.
///
/// `weather_code`/`description` are proprietary and filled by
/// [`HourlyForecast::build`]; the raw upstream code is retained off-wire in
/// `provider_code` for alert analysis only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyForecast {
    pub timestamp: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apparent_temperature: Option<f64>,
    pub precipitation: f64,
    pub precipitation_probability: f64,
    pub rainfall_intensity: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: u16,
    pub cloud_cover: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_day: Option<bool>,
    pub weather_code: u16,
    pub description: String,
    #[serde(skip)]
    pub provider_code: u16,
}

impl HourlyForecast {
    /// Finalize construction: classify the condition when the mapper left
    /// the code/description unset. Never returns a partially classified
    /// entity.
    #[must_use]
    pub fn build(fields: Self) -> Self {
        let mut entity = fields;
        if entity.weather_code == 0 || entity.description.is_empty() {
            let (code, description) = classify_condition(
                entity.rainfall_intensity,
                entity.precipitation,
                entity.wind_speed,
                entity.cloud_cover,
                entity.visibility.unwrap_or(10_000.0),
                entity.temperature,
                entity.precipitation_probability,
            );
            entity.weather_code = code;
            entity.description = description.to_string();
        }
        entity
    }

    #[must_use]
    pub fn parsed_timestamp(&self) -> Option<DateTime<Tz>> {
        parse_forecast_timestamp(&self.timestamp)
    }
}

/// One day of the extended (up to 16-day) forecast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub date: String,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apparent_temp_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apparent_temp_max: Option<f64>,
    pub precipitation_mm: f64,
    pub rain_probability: f64,
    pub rainfall_intensity: f64,
    pub wind_speed_max: f64,
    pub wind_direction: u16,
    pub uv_index: f64,
    pub sunrise: String,
    pub sunset: String,
    pub precipitation_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clouds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    pub weather_code: u16,
    pub description: String,
}

impl DailyForecast {
    /// Finalize construction, classifying from the daily aggregates: mean
    /// temperature and precipitation spread over the precipitation hours.
    #[must_use]
    pub fn build(fields: Self) -> Self {
        let mut entity = fields;
        if entity.weather_code == 0 || entity.description.is_empty() {
            let temp_avg = (entity.temp_min + entity.temp_max) / 2.0;
            let precip_per_hour = if entity.precipitation_hours > 0.0 {
                entity.precipitation_mm / entity.precipitation_hours
            } else {
                0.0
            };
            let (code, description) = classify_condition(
                entity.rainfall_intensity,
                precip_per_hour,
                entity.wind_speed_max,
                entity.clouds.unwrap_or(50.0),
                entity.visibility.unwrap_or(10_000.0),
                temp_avg,
                entity.rain_probability,
            );
            entity.weather_code = code;
            entity.description = description.to_string();
        }
        entity
    }

    /// Daylight duration in hours from the HH:MM sunrise/sunset pair.
    /// Returns 0.0 when either field is malformed.
    #[must_use]
    pub fn daylight_hours(&self) -> f64 {
        let Some(sunrise) = parse_minutes(&self.sunrise) else {
            return 0.0;
        };
        let Some(sunset) = parse_minutes(&self.sunset) else {
            return 0.0;
        };
        let minutes = sunset - sunrise;
        (f64::from(minutes) / 60.0 * 10.0).round() / 10.0
    }

    /// WHO UV risk scale, five bands.
    #[must_use]
    pub fn uv_risk_level(&self) -> &'static str {
        if self.uv_index <= 2.0 {
            "Baixo"
        } else if self.uv_index <= 5.0 {
            "Moderado"
        } else if self.uv_index <= 7.0 {
            "Alto"
        } else if self.uv_index <= 10.0 {
            "Muito Alto"
        } else {
            "Extremo"
        }
    }

    /// Arrow pointing where the wind blows to. `wind_direction` reports
    /// where the wind comes from, hence the 180 degree flip.
    #[must_use]
    pub fn wind_direction_arrow(&self) -> &'static str {
        const ARROWS: [&str; 8] = ["↑", "↗", "→", "↘", "↓", "↙", "←", "↖"];
        let blowing_to = f64::from((self.wind_direction + 180) % 360);
        let index = ((blowing_to + 22.5) / 45.0) as usize % 8;
        ARROWS[index]
    }

    #[must_use]
    pub fn start_of_day(&self) -> Option<DateTime<Tz>> {
        date_start_of_day(&self.date)
    }
}

fn parse_minutes(hhmm: &str) -> Option<i32> {
    let (hours, minutes) = hhmm.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    Some(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition;

    fn bare_hourly(timestamp: &str) -> HourlyForecast {
        HourlyForecast {
            timestamp: timestamp.to_string(),
            temperature: 25.0,
            apparent_temperature: None,
            precipitation: 0.0,
            precipitation_probability: 0.0,
            rainfall_intensity: 0.0,
            humidity: 60.0,
            wind_speed: 10.0,
            wind_direction: 90,
            cloud_cover: 10.0,
            pressure: None,
            visibility: None,
            uv_index: None,
            is_day: Some(true),
            weather_code: 0,
            description: String::new(),
            provider_code: 0,
        }
    }

    fn bare_daily(date: &str) -> DailyForecast {
        DailyForecast {
            date: date.to_string(),
            temp_min: 18.0,
            temp_max: 28.0,
            apparent_temp_min: None,
            apparent_temp_max: None,
            precipitation_mm: 0.0,
            rain_probability: 0.0,
            rainfall_intensity: 0.0,
            wind_speed_max: 15.0,
            wind_direction: 180,
            uv_index: 6.0,
            sunrise: "06:11".to_string(),
            sunset: "18:43".to_string(),
            precipitation_hours: 0.0,
            clouds: None,
            visibility: None,
            weather_code: 0,
            description: String::new(),
        }
    }

    #[test]
    fn parses_naive_and_offset_timestamps() {
        let naive = parse_forecast_timestamp("2026-03-10T14:00").expect("naive form");
        let offset = parse_forecast_timestamp("2026-03-10T14:00-03:00").expect("offset form");
        assert_eq!(naive, offset);
        assert!(parse_forecast_timestamp("not-a-date").is_none());
    }

    #[test]
    fn build_fills_classification() {
        let hourly = HourlyForecast::build(bare_hourly("2026-03-10T14:00"));
        assert_eq!(hourly.weather_code, condition::CLEAR);
        assert_eq!(hourly.description, "Céu limpo");
    }

    #[test]
    fn build_keeps_existing_classification() {
        let mut fields = bare_hourly("2026-03-10T14:00");
        fields.weather_code = condition::FOG;
        fields.description = "Neblina".to_string();
        let hourly = HourlyForecast::build(fields);
        assert_eq!(hourly.weather_code, condition::FOG);
    }

    #[test]
    fn daily_build_uses_precip_per_hour() {
        let mut fields = bare_daily("2026-03-10");
        fields.precipitation_mm = 24.0;
        fields.precipitation_hours = 8.0;
        fields.rain_probability = 100.0;
        fields.rainfall_intensity = condition::rainfall_intensity(100.0, 3.0);
        let daily = DailyForecast::build(fields);
        // 3mm/h at 100% -> intensity 10, below the rain band
        assert_eq!(daily.weather_code, condition::HEAVY_DRIZZLE);
    }

    #[test]
    fn daylight_hours_from_sun_times() {
        let daily = bare_daily("2026-03-10");
        assert!((daily.daylight_hours() - 12.5).abs() < 0.06);

        let mut broken = bare_daily("2026-03-10");
        broken.sunrise = "??".to_string();
        assert_eq!(broken.daylight_hours(), 0.0);
    }

    #[test]
    fn uv_risk_bands() {
        let mut daily = bare_daily("2026-03-10");
        daily.uv_index = 1.0;
        assert_eq!(daily.uv_risk_level(), "Baixo");
        daily.uv_index = 5.0;
        assert_eq!(daily.uv_risk_level(), "Moderado");
        daily.uv_index = 7.0;
        assert_eq!(daily.uv_risk_level(), "Alto");
        daily.uv_index = 9.0;
        assert_eq!(daily.uv_risk_level(), "Muito Alto");
        daily.uv_index = 11.0;
        assert_eq!(daily.uv_risk_level(), "Extremo");
    }

    #[test]
    fn wind_arrow_flips_direction() {
        let mut daily = bare_daily("2026-03-10");
        daily.wind_direction = 0; // from north, blowing south
        assert_eq!(daily.wind_direction_arrow(), "↓");
        daily.wind_direction = 270; // from west, blowing east
        assert_eq!(daily.wind_direction_arrow(), "→");
    }
}
