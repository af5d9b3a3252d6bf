//! Open-Meteo provider: 168-hour hourly and 16-day daily forecasts, with
//! cache prefetch/staging hooks for the regional fan-out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::cache::{CacheStore, TTL_DAILY_SECS, TTL_HOURLY_SECS};
use super::http::{fetch_json_with_retry, shared_client};
use super::{Prefetched, StagedWrites};
use crate::domain::condition::rainfall_intensity;
use crate::domain::errors::WeatherError;
use crate::domain::forecast::{DailyForecast, HourlyForecast, SAO_PAULO};
use crate::domain::weather::Weather;

pub const OPENMETEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Cache key prefixes encode provider and dataset.
pub const PREFIX_HOURLY: &str = "openmeteo_hourly_";
pub const PREFIX_DAILY: &str = "openmeteo_";

pub const MAX_FORECAST_DAYS: usize = 16;
pub const MAX_FORECAST_HOURS: usize = 168;

const HOURLY_FIELDS: &str = "temperature_2m,apparent_temperature,precipitation,\
precipitation_probability,relative_humidity_2m,wind_speed_10m,wind_direction_10m,\
cloud_cover,pressure_msl,visibility,uv_index,is_day,weather_code";

const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,\
apparent_temperature_max,apparent_temperature_min,precipitation_sum,\
precipitation_probability_mean,wind_speed_10m_max,wind_direction_10m_dominant,\
uv_index_max,sunrise,sunset,precipitation_hours";

#[must_use]
pub fn hourly_cache_key(city_id: &str) -> String {
    format!("{PREFIX_HOURLY}{city_id}")
}

#[must_use]
pub fn daily_cache_key(city_id: &str) -> String {
    format!("{PREFIX_DAILY}{city_id}")
}

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Client,
    cache: Arc<CacheStore>,
    base_url: String,
}

impl OpenMeteoProvider {
    #[must_use]
    pub fn new(cache: Arc<CacheStore>) -> Self {
        let url = std::env::var("TEMPO_REGIONAL_OPENMETEO_URL")
            .unwrap_or_else(|_| OPENMETEO_FORECAST_URL.to_string());
        Self::with_base_url(cache, url)
    }

    pub fn with_base_url(cache: Arc<CacheStore>, base_url: impl Into<String>) -> Self {
        Self {
            client: shared_client().clone(),
            cache,
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub const fn supports_current_weather(&self) -> bool {
        // Served through the hourly dataset
        true
    }

    #[must_use]
    pub const fn supports_daily_forecast(&self) -> bool {
        true
    }

    #[must_use]
    pub const fn supports_hourly_forecast(&self) -> bool {
        true
    }

    /// Fetch up to `hours` (≤168) hourly entries.
    ///
    /// Cache flow: prefetched map, then the store, then the upstream call.
    /// With a `cache_writes` staging map the fetched payload is parked for
    /// a later batch write instead of being committed immediately.
    pub async fn get_hourly_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        city_id: &str,
        hours: usize,
        prefetched: Option<&Prefetched>,
        cache_writes: Option<&StagedWrites>,
    ) -> Result<Vec<HourlyForecast>, WeatherError> {
        let hours = hours.clamp(1, MAX_FORECAST_HOURS);
        let key = hourly_cache_key(city_id);

        let data = match self.cached_payload(&key, prefetched).await {
            Some(data) => data,
            None => {
                let forecast_days = MAX_FORECAST_DAYS.min(hours / 24 + 1);
                let query = [
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("hourly", HOURLY_FIELDS.to_string()),
                    ("timezone", "America/Sao_Paulo".to_string()),
                    ("forecast_days", forecast_days.to_string()),
                ];
                let fetched =
                    fetch_json_with_retry(&self.client, &self.base_url, &query).await?;
                self.store_payload(&key, &fetched, TTL_HOURLY_SECS, cache_writes)
                    .await;
                fetched
            }
        };

        Ok(map_hourly_response(&data, hours))
    }

    /// Fetch up to `days` (≤16) daily entries. Same cache flow as hourly.
    pub async fn get_daily_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        city_id: &str,
        days: usize,
        prefetched: Option<&Prefetched>,
        cache_writes: Option<&StagedWrites>,
    ) -> Result<Vec<DailyForecast>, WeatherError> {
        let days = days.clamp(1, MAX_FORECAST_DAYS);
        let key = daily_cache_key(city_id);

        let data = match self.cached_payload(&key, prefetched).await {
            Some(data) => data,
            None => {
                let query = [
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("daily", DAILY_FIELDS.to_string()),
                    ("timezone", "America/Sao_Paulo".to_string()),
                    ("forecast_days", days.to_string()),
                ];
                let fetched =
                    fetch_json_with_retry(&self.client, &self.base_url, &query).await?;
                self.store_payload(&key, &fetched, TTL_DAILY_SECS, cache_writes)
                    .await;
                fetched
            }
        };

        Ok(map_daily_response(&data))
    }

    /// Current conditions via the hourly dataset plus today's daily entry.
    pub async fn get_current_weather(
        &self,
        latitude: f64,
        longitude: f64,
        city_id: &str,
        city_name: &str,
        target_datetime: Option<DateTime<Tz>>,
    ) -> Result<Weather, WeatherError> {
        let (hourly, daily) = tokio::join!(
            self.get_hourly_forecast(latitude, longitude, city_id, MAX_FORECAST_HOURS, None, None),
            self.get_daily_forecast(latitude, longitude, city_id, 1, None, None),
        );
        let hourly = hourly?;
        let daily = daily.unwrap_or_default();

        extract_current_weather_from_hourly(&hourly, &daily, city_id, city_name, target_datetime)
    }

    async fn cached_payload(&self, key: &str, prefetched: Option<&Prefetched>) -> Option<Value> {
        if let Some(map) = prefetched
            && let Some(value) = map.get(key)
        {
            debug!("prefetched cache hit: {key}");
            return Some(value.clone());
        }
        self.cache.get(key).await
    }

    async fn store_payload(
        &self,
        key: &str,
        payload: &Value,
        ttl_seconds: u64,
        cache_writes: Option<&StagedWrites>,
    ) {
        if let Some(writes) = cache_writes {
            if let Ok(mut map) = writes.lock() {
                map.insert(key.to_string(), payload.clone());
            }
            return;
        }
        self.cache.set(key, payload, ttl_seconds).await;
    }
}

/// Pick the hourly entry representing "current" conditions and merge the
/// matching day's daily record into it.
///
/// Only future entries (relative to the wall clock) are candidates: a
/// target in the past selects the first future entry, a target in the
/// future the closest one. With no future entries the last available
/// entry is used.
pub fn extract_current_weather_from_hourly(
    hourly: &[HourlyForecast],
    daily: &[DailyForecast],
    city_id: &str,
    city_name: &str,
    target_datetime: Option<DateTime<Tz>>,
) -> Result<Weather, WeatherError> {
    extract_current_weather_from_hourly_at(
        hourly,
        daily,
        city_id,
        city_name,
        target_datetime,
        Utc::now().with_timezone(&SAO_PAULO),
    )
}

/// Clock-injected variant of [`extract_current_weather_from_hourly`].
pub fn extract_current_weather_from_hourly_at(
    hourly: &[HourlyForecast],
    daily: &[DailyForecast],
    city_id: &str,
    city_name: &str,
    target_datetime: Option<DateTime<Tz>>,
    now: DateTime<Tz>,
) -> Result<Weather, WeatherError> {
    if hourly.is_empty() {
        return Err(WeatherError::WeatherDataNotFound);
    }
    let target = target_datetime.unwrap_or(now);

    let future: Vec<(&HourlyForecast, DateTime<Tz>)> = hourly
        .iter()
        .filter_map(|hour| hour.parsed_timestamp().map(|ts| (hour, ts)))
        .filter(|(_, ts)| *ts >= now)
        .collect();

    let chosen = if future.is_empty() {
        hourly.last().expect("hourly is non-empty")
    } else if target < now {
        future
            .iter()
            .min_by_key(|(_, ts)| *ts)
            .map(|(hour, _)| *hour)
            .expect("future is non-empty")
    } else {
        future
            .iter()
            .min_by_key(|(_, ts)| (*ts - target).abs())
            .map(|(hour, _)| *hour)
            .expect("future is non-empty")
    };

    let target_date = target.date_naive().to_string();
    let day = daily
        .iter()
        .find(|day| day.date == target_date)
        .or_else(|| daily.first());
    let (temp_min, temp_max, rain_accumulated_day) = day
        .map(|day| (day.temp_min, day.temp_max, day.precipitation_mm))
        .unwrap_or_default();

    map_hourly_to_weather(
        chosen,
        city_id,
        city_name,
        temp_min,
        temp_max,
        rain_accumulated_day,
    )
    .ok_or(WeatherError::WeatherDataNotFound)
}

#[derive(Debug, Default, Deserialize)]
struct HourlyEnvelope {
    #[serde(default)]
    hourly: HourlyBlock,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    pressure_msl: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
    #[serde(default)]
    uv_index: Vec<Option<f64>>,
    #[serde(default)]
    is_day: Vec<Option<u8>>,
    #[serde(default)]
    weather_code: Vec<Option<u16>>,
}

#[derive(Debug, Default, Deserialize)]
struct DailyEnvelope {
    #[serde(default)]
    daily: DailyBlock,
}

#[derive(Debug, Default, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature_max: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_mean: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m_dominant: Vec<Option<f64>>,
    #[serde(default)]
    uv_index_max: Vec<Option<f64>>,
    #[serde(default)]
    sunrise: Vec<String>,
    #[serde(default)]
    sunset: Vec<String>,
    #[serde(default)]
    precipitation_hours: Vec<Option<f64>>,
}

fn opt(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

/// Map a raw hourly payload into entities, truncated to `max_hours`.
#[must_use]
pub fn map_hourly_response(data: &Value, max_hours: usize) -> Vec<HourlyForecast> {
    let Ok(envelope) = serde_json::from_value::<HourlyEnvelope>(data.clone()) else {
        warn!("hourly payload has an unexpected shape");
        return Vec::new();
    };
    let block = envelope.hourly;
    let limit = block.time.len().min(max_hours);

    let mut forecasts = Vec::with_capacity(limit);
    for i in 0..limit {
        let precipitation = opt(&block.precipitation, i).unwrap_or(0.0);
        let probability = opt(&block.precipitation_probability, i).unwrap_or(0.0);

        forecasts.push(HourlyForecast::build(HourlyForecast {
            timestamp: block.time[i].clone(),
            temperature: opt(&block.temperature_2m, i).unwrap_or(0.0),
            apparent_temperature: opt(&block.apparent_temperature, i),
            precipitation,
            precipitation_probability: probability,
            rainfall_intensity: rainfall_intensity(probability, precipitation),
            humidity: opt(&block.relative_humidity_2m, i).unwrap_or(0.0),
            wind_speed: opt(&block.wind_speed_10m, i).unwrap_or(0.0),
            wind_direction: to_direction(opt(&block.wind_direction_10m, i)),
            cloud_cover: opt(&block.cloud_cover, i).unwrap_or(0.0),
            pressure: opt(&block.pressure_msl, i),
            visibility: opt(&block.visibility, i),
            uv_index: opt(&block.uv_index, i),
            is_day: block
                .is_day
                .get(i)
                .copied()
                .flatten()
                .map(|value| value == 1),
            weather_code: 0,
            description: String::new(),
            provider_code: block.weather_code.get(i).copied().flatten().unwrap_or(0),
        }));
    }
    forecasts
}

/// Map a raw daily payload into entities. Days without both temperature
/// bounds are skipped.
#[must_use]
pub fn map_daily_response(data: &Value) -> Vec<DailyForecast> {
    let Ok(envelope) = serde_json::from_value::<DailyEnvelope>(data.clone()) else {
        warn!("daily payload has an unexpected shape");
        return Vec::new();
    };
    let block = envelope.daily;

    let mut forecasts = Vec::with_capacity(block.time.len());
    for (i, date) in block.time.iter().enumerate() {
        let (Some(temp_max), Some(temp_min)) = (
            opt(&block.temperature_2m_max, i),
            opt(&block.temperature_2m_min, i),
        ) else {
            warn!("day {date}: missing temperatures, skipping");
            continue;
        };

        let precipitation_mm = opt(&block.precipitation_sum, i).unwrap_or(0.0);
        let rain_probability = opt(&block.precipitation_probability_mean, i).unwrap_or(0.0);
        let precipitation_hours = opt(&block.precipitation_hours, i).unwrap_or(0.0);
        let precip_per_hour = if precipitation_hours > 0.0 && precipitation_mm > 0.0 {
            precipitation_mm / precipitation_hours
        } else {
            0.0
        };

        forecasts.push(DailyForecast::build(DailyForecast {
            date: date.clone(),
            temp_min,
            temp_max,
            apparent_temp_min: opt(&block.apparent_temperature_min, i),
            apparent_temp_max: opt(&block.apparent_temperature_max, i),
            precipitation_mm,
            rain_probability,
            rainfall_intensity: rainfall_intensity(rain_probability, precip_per_hour),
            wind_speed_max: opt(&block.wind_speed_10m_max, i).unwrap_or(0.0),
            wind_direction: to_direction(opt(&block.wind_direction_10m_dominant, i)),
            uv_index: opt(&block.uv_index_max, i).unwrap_or(0.0),
            sunrise: trim_to_clock(block.sunrise.get(i), "06:00"),
            sunset: trim_to_clock(block.sunset.get(i), "18:00"),
            precipitation_hours,
            clouds: None,
            visibility: None,
            weather_code: 0,
            description: String::new(),
        }));
    }
    forecasts
}

/// Convert one hourly entry into a Weather aggregate, merging the daily
/// bounds supplied by the caller.
#[must_use]
pub fn map_hourly_to_weather(
    hour: &HourlyForecast,
    city_id: &str,
    city_name: &str,
    temp_min: f64,
    temp_max: f64,
    rain_accumulated_day: f64,
) -> Option<Weather> {
    let timestamp = hour.parsed_timestamp()?;

    let feels_like = hour.apparent_temperature.unwrap_or_else(|| {
        calculate_feels_like(hour.temperature, hour.humidity, hour.wind_speed)
    });
    let pressure = hour.pressure.unwrap_or_else(|| {
        debug!("hour {}: missing pressure, using 1013 hPa", hour.timestamp);
        1013.0
    });
    let visibility = hour.visibility.unwrap_or_else(|| {
        debug!("hour {}: missing visibility, using 10000 m", hour.timestamp);
        10_000.0
    });

    Some(Weather::build(Weather {
        city_id: city_id.to_string(),
        city_name: city_name.to_string(),
        timestamp,
        temperature: hour.temperature,
        feels_like,
        humidity: hour.humidity,
        pressure,
        visibility,
        clouds: hour.cloud_cover,
        wind_speed: hour.wind_speed,
        wind_direction: hour.wind_direction,
        rain_probability: hour.precipitation_probability,
        rain_1h: hour.precipitation,
        rain_accumulated_day,
        temp_min,
        temp_max,
        is_day: hour.is_day.unwrap_or(true),
        weather_code: 0,
        description: String::new(),
        weather_alert: Vec::new(),
        daily_aggregates: None,
    }))
}

/// Apparent temperature fallback: heat index in hot humid air, wind chill
/// in cold wind, dry-bulb otherwise.
#[must_use]
pub fn calculate_feels_like(temperature: f64, humidity: f64, wind_speed_kmh: f64) -> f64 {
    if temperature > 27.0 {
        let vapor_pressure =
            6.112 * ((17.67 * temperature) / (temperature + 243.5)).exp() * (humidity / 100.0);
        let heat_index = temperature + 0.5555 * (vapor_pressure - 10.0);
        return (heat_index * 10.0).round() / 10.0;
    }
    if temperature < 10.0 && wind_speed_kmh > 4.8 {
        let v_power = wind_speed_kmh.powf(0.16);
        let wind_chill =
            13.12 + 0.6215 * temperature - 11.37 * v_power + 0.3965 * temperature * v_power;
        return (wind_chill * 10.0).round() / 10.0;
    }
    temperature
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_direction(value: Option<f64>) -> u16 {
    value.map_or(0, |degrees| degrees.rem_euclid(360.0).round() as u16 % 360)
}

fn trim_to_clock(value: Option<&String>, fallback: &str) -> String {
    value.map_or_else(
        || fallback.to_string(),
        |raw| {
            raw.split_once('T')
                .map_or_else(|| raw.clone(), |(_, clock)| clock.to_string())
        },
    )
}
