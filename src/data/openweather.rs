//! OpenWeather One-Call 3.0 provider: current, daily (8 days) and hourly
//! (48 h) views mapped from a single cached payload.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::cache::{CacheStore, TTL_DAILY_SECS};
use super::http::{fetch_json_with_retry, shared_client};
use super::{Prefetched, StagedWrites};
use crate::domain::condition::rainfall_intensity;
use crate::domain::errors::WeatherError;
use crate::domain::forecast::{DailyForecast, HourlyForecast, SAO_PAULO};
use crate::domain::weather::Weather;

pub const ONECALL_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// One-Call payloads are keyed by the bare city id, with no prefix.
pub const MAX_ONECALL_DAYS: usize = 8;
pub const MAX_ONECALL_HOURS: usize = 48;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: Client,
    cache: Arc<CacheStore>,
    base_url: String,
    api_key: String,
}

impl OpenWeatherProvider {
    #[must_use]
    pub fn new(cache: Arc<CacheStore>, api_key: String) -> Self {
        let url = std::env::var("TEMPO_REGIONAL_OPENWEATHER_URL")
            .unwrap_or_else(|_| ONECALL_URL.to_string());
        Self::with_base_url(cache, url, api_key)
    }

    pub fn with_base_url(
        cache: Arc<CacheStore>,
        base_url: impl Into<String>,
        api_key: String,
    ) -> Self {
        Self {
            client: shared_client().clone(),
            cache,
            base_url: base_url.into(),
            api_key,
        }
    }

    #[must_use]
    pub const fn supports_current_weather(&self) -> bool {
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

    /// Current conditions from the One-Call `current` block. When the
    /// payload also carries hourly data, the nearest hour overrides the
    /// hourly-sampled fields while the OpenWeather-only fields
    /// (feels_like, pressure, visibility) are preserved.
    pub async fn get_current_weather(
        &self,
        latitude: f64,
        longitude: f64,
        city_id: &str,
        city_name: &str,
        target_datetime: Option<DateTime<Tz>>,
    ) -> Result<Weather, WeatherError> {
        let payload = self
            .fetch_onecall(latitude, longitude, city_id, None, None)
            .await?;
        let weather = map_onecall_current(&payload, city_id, city_name)?;

        let hourly = map_onecall_hourly(&payload, MAX_ONECALL_HOURS);
        if hourly.is_empty() {
            return Ok(weather);
        }
        Ok(enrich_current_with_hourly(&weather, &hourly, target_datetime).unwrap_or(weather))
    }

    pub async fn get_daily_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        city_id: &str,
        days: usize,
        prefetched: Option<&Prefetched>,
        cache_writes: Option<&StagedWrites>,
    ) -> Result<Vec<DailyForecast>, WeatherError> {
        let payload = self
            .fetch_onecall(latitude, longitude, city_id, prefetched, cache_writes)
            .await?;
        Ok(map_onecall_daily(&payload, days.min(MAX_ONECALL_DAYS)))
    }

    pub async fn get_hourly_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        city_id: &str,
        hours: usize,
        prefetched: Option<&Prefetched>,
        cache_writes: Option<&StagedWrites>,
    ) -> Result<Vec<HourlyForecast>, WeatherError> {
        let payload = self
            .fetch_onecall(latitude, longitude, city_id, prefetched, cache_writes)
            .await?;
        Ok(map_onecall_hourly(&payload, hours.min(MAX_ONECALL_HOURS)))
    }

    async fn fetch_onecall(
        &self,
        latitude: f64,
        longitude: f64,
        city_id: &str,
        prefetched: Option<&Prefetched>,
        cache_writes: Option<&StagedWrites>,
    ) -> Result<Value, WeatherError> {
        if let Some(map) = prefetched
            && let Some(value) = map.get(city_id)
        {
            debug!("prefetched cache hit: {city_id}");
            return Ok(value.clone());
        }
        if let Some(cached) = self.cache.get(city_id).await {
            return Ok(cached);
        }

        let query = [
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
            ("lang", "pt_br".to_string()),
            ("exclude", "minutely,alerts".to_string()),
        ];
        let fetched = fetch_json_with_retry(&self.client, &self.base_url, &query).await?;

        if let Some(writes) = cache_writes {
            if let Ok(mut map) = writes.lock() {
                map.insert(city_id.to_string(), fetched.clone());
            }
        } else {
            self.cache.set(city_id, &fetched, TTL_DAILY_SECS).await;
        }
        Ok(fetched)
    }
}

#[derive(Debug, Default, Deserialize)]
struct OneCallEnvelope {
    current: Option<CurrentBlock>,
    #[serde(default)]
    hourly: Vec<HourBlock>,
    #[serde(default)]
    daily: Vec<DayBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentBlock {
    #[serde(default)]
    dt: i64,
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    feels_like: f64,
    #[serde(default)]
    pressure: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    clouds: f64,
    visibility: Option<f64>,
    #[serde(default)]
    wind_speed: f64,
    #[serde(default)]
    wind_deg: f64,
    #[serde(default)]
    rain: PrecipBlock,
    #[serde(default)]
    snow: PrecipBlock,
}

#[derive(Debug, Default, Deserialize)]
struct HourBlock {
    #[serde(default)]
    dt: i64,
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    clouds: f64,
    visibility: Option<f64>,
    pressure: Option<f64>,
    uvi: Option<f64>,
    #[serde(default)]
    wind_speed: f64,
    #[serde(default)]
    wind_deg: f64,
    #[serde(default)]
    pop: f64,
    #[serde(default)]
    rain: PrecipBlock,
    #[serde(default)]
    snow: PrecipBlock,
    #[serde(default)]
    weather: Vec<WeatherInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct DayBlock {
    #[serde(default)]
    dt: i64,
    #[serde(default)]
    temp: TempBlock,
    #[serde(default)]
    wind_speed: f64,
    #[serde(default)]
    wind_deg: f64,
    #[serde(default)]
    pop: f64,
    rain: Option<f64>,
    snow: Option<f64>,
    #[serde(default)]
    uvi: f64,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TempBlock {
    #[serde(default)]
    min: f64,
    #[serde(default)]
    max: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherInfo {
    #[serde(default)]
    id: u16,
}

/// Precipitation block: `{"1h": x}` normally, `{"3h": x}` from some
/// endpoints. Per-hour volume divides the 3-hour field by 3 when only
/// that one is present.
#[derive(Debug, Default, Deserialize)]
struct PrecipBlock {
    #[serde(rename = "1h")]
    one_h: Option<f64>,
    #[serde(rename = "3h")]
    three_h: Option<f64>,
}

impl PrecipBlock {
    fn per_hour(&self) -> f64 {
        match (self.one_h, self.three_h) {
            (Some(volume), _) => volume,
            (None, Some(volume)) => volume / 3.0,
            (None, None) => 0.0,
        }
    }
}

fn unix_to_local(dt: i64) -> DateTime<Tz> {
    Utc.timestamp_opt(dt, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .with_timezone(&SAO_PAULO)
}

const MS_TO_KMH: f64 = 3.6;

/// Map the One-Call `current` block into a Weather aggregate.
pub fn map_onecall_current(
    data: &Value,
    city_id: &str,
    city_name: &str,
) -> Result<Weather, WeatherError> {
    let envelope: OneCallEnvelope =
        serde_json::from_value(data.clone()).map_err(|_| WeatherError::WeatherDataNotFound)?;
    let current = envelope.current.ok_or(WeatherError::WeatherDataNotFound)?;

    let rain_1h = current.rain.per_hour() + current.snow.per_hour();
    let visibility = current.visibility.unwrap_or_else(|| {
        debug!("onecall current for {city_id}: missing visibility, using 10000 m");
        10_000.0
    });

    let (temp_min, temp_max, rain_accumulated_day) = envelope.daily.first().map_or(
        (current.temp, current.temp, rain_1h),
        |today| {
            (
                today.temp.min,
                today.temp.max,
                today.rain.unwrap_or(0.0) + today.snow.unwrap_or(0.0),
            )
        },
    );

    Ok(Weather::build(Weather {
        city_id: city_id.to_string(),
        city_name: city_name.to_string(),
        timestamp: unix_to_local(current.dt),
        temperature: current.temp,
        feels_like: current.feels_like,
        humidity: current.humidity,
        pressure: current.pressure,
        visibility,
        clouds: current.clouds,
        wind_speed: current.wind_speed * MS_TO_KMH,
        wind_direction: to_direction(current.wind_deg),
        rain_probability: 0.0, // the current block carries no probability
        rain_1h,
        rain_accumulated_day,
        temp_min,
        temp_max,
        is_day: true,
        weather_code: 0,
        description: String::new(),
        weather_alert: Vec::new(),
        daily_aggregates: None,
    }))
}

/// Map One-Call `daily` entries (m/s wind and 0-1 probabilities become
/// km/h and percent).
#[must_use]
pub fn map_onecall_daily(data: &Value, max_days: usize) -> Vec<DailyForecast> {
    let Ok(envelope) = serde_json::from_value::<OneCallEnvelope>(data.clone()) else {
        return Vec::new();
    };

    envelope
        .daily
        .iter()
        .take(max_days)
        .map(|day| {
            let date = unix_to_local(day.dt).format("%Y-%m-%d").to_string();
            let precipitation_mm = day.rain.unwrap_or(0.0) + day.snow.unwrap_or(0.0);
            let rain_probability = day.pop * 100.0;
            // One-Call has no precipitation_hours; estimate from the
            // probability, and spread the volume over the day for the
            // intensity score.
            let precipitation_hours = rain_probability / 100.0 * 12.0;
            let precip_per_hour = if precipitation_mm > 0.0 {
                precipitation_mm / 24.0
            } else {
                0.0
            };

            DailyForecast::build(DailyForecast {
                date,
                temp_min: day.temp.min,
                temp_max: day.temp.max,
                apparent_temp_min: None,
                apparent_temp_max: None,
                precipitation_mm,
                rain_probability,
                rainfall_intensity: rainfall_intensity(rain_probability, precip_per_hour),
                wind_speed_max: day.wind_speed * MS_TO_KMH,
                wind_direction: to_direction(day.wind_deg),
                uv_index: day.uvi,
                sunrise: unix_to_local(day.sunrise).format("%H:%M").to_string(),
                sunset: unix_to_local(day.sunset).format("%H:%M").to_string(),
                precipitation_hours,
                clouds: None,
                visibility: None,
                weather_code: 0,
                description: String::new(),
            })
        })
        .collect()
}

/// Map One-Call `hourly` entries into the shared hourly entity.
#[must_use]
pub fn map_onecall_hourly(data: &Value, max_hours: usize) -> Vec<HourlyForecast> {
    let Ok(envelope) = serde_json::from_value::<OneCallEnvelope>(data.clone()) else {
        return Vec::new();
    };

    envelope
        .hourly
        .iter()
        .take(max_hours)
        .map(|hour| {
            let precipitation = hour.rain.per_hour() + hour.snow.per_hour();
            let probability = hour.pop * 100.0;

            HourlyForecast::build(HourlyForecast {
                timestamp: unix_to_local(hour.dt).format("%Y-%m-%dT%H:%M").to_string(),
                temperature: hour.temp,
                apparent_temperature: None,
                precipitation,
                precipitation_probability: probability,
                rainfall_intensity: rainfall_intensity(probability, precipitation),
                humidity: hour.humidity,
                wind_speed: hour.wind_speed * MS_TO_KMH,
                wind_direction: to_direction(hour.wind_deg),
                cloud_cover: hour.clouds,
                pressure: hour.pressure,
                visibility: hour.visibility,
                uv_index: hour.uvi,
                is_day: None,
                weather_code: 0,
                description: String::new(),
                provider_code: hour.weather.first().map_or(0, |info| info.id),
            })
        })
        .collect()
}

/// Override the hourly-sampled fields of `base` with the nearest hourly
/// entry while preserving the OpenWeather-only fields (feels_like,
/// pressure, visibility). Daily rain accumulation and temperature bounds
/// are recomputed from the hourly series for the chosen day.
#[must_use]
pub fn enrich_current_with_hourly(
    base: &Weather,
    hourly: &[HourlyForecast],
    target_datetime: Option<DateTime<Tz>>,
) -> Option<Weather> {
    let reference = target_datetime.unwrap_or(base.timestamp);

    let (chosen, chosen_ts) = hourly
        .iter()
        .filter_map(|hour| hour.parsed_timestamp().map(|ts| (hour, ts)))
        .min_by_key(|(_, ts)| (*ts - reference).abs())?;

    let day = chosen_ts.date_naive();
    let mut rain_accumulated_day = 0.0;
    let mut temps: Vec<f64> = Vec::new();
    for hour in hourly {
        let Some(ts) = hour.parsed_timestamp() else {
            continue;
        };
        if ts.date_naive() == day {
            rain_accumulated_day += hour.precipitation;
            temps.push(hour.temperature);
        }
    }
    let temp_min = temps.iter().copied().fold(f64::INFINITY, f64::min);
    let temp_max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (temp_min, temp_max) = if temps.is_empty() {
        (base.temp_min, base.temp_max)
    } else {
        (temp_min, temp_max)
    };

    Some(Weather::build(Weather {
        city_id: base.city_id.clone(),
        city_name: base.city_name.clone(),
        timestamp: chosen_ts,
        temperature: chosen.temperature,
        humidity: chosen.humidity,
        wind_speed: chosen.wind_speed,
        wind_direction: chosen.wind_direction,
        rain_probability: chosen.precipitation_probability,
        rain_1h: chosen.precipitation,
        rain_accumulated_day,
        clouds: chosen.cloud_cover,
        temp_min,
        temp_max,
        is_day: chosen.is_day.unwrap_or(base.is_day),
        // OpenWeather-only fields survive the enrichment
        feels_like: base.feels_like,
        pressure: base.pressure,
        visibility: base.visibility,
        weather_code: 0,
        description: String::new(),
        weather_alert: base.weather_alert.clone(),
        daily_aggregates: base.daily_aggregates.clone(),
    }))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_direction(degrees: f64) -> u16 {
    degrees.rem_euclid(360.0).round() as u16 % 360
}
