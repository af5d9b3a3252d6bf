//! Single-city pipeline: hourly and daily fetched in parallel, current
//! conditions extracted, daily aggregates and alerts attached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::data::municipalities::CityRepository;
use crate::data::openmeteo::{
    self, OpenMeteoProvider, extract_current_weather_from_hourly,
};
use crate::data::{Prefetched, StagedWrites};
use crate::domain::alerts::generator::{DAYS_LIMIT_DEFAULT, generate_alerts};
use crate::domain::city::City;
use crate::domain::errors::WeatherError;
use crate::domain::forecast::{DailyForecast, HourlyForecast, SAO_PAULO};
use crate::domain::weather::{DailyAggregatedMetrics, Weather};

pub struct GetCityWeather {
    cities: Arc<CityRepository>,
    provider: Arc<OpenMeteoProvider>,
}

impl GetCityWeather {
    #[must_use]
    pub fn new(cities: Arc<CityRepository>, provider: Arc<OpenMeteoProvider>) -> Self {
        Self { cities, provider }
    }

    pub async fn execute(
        &self,
        city_id: &str,
        target_datetime: Option<DateTime<Tz>>,
    ) -> Result<Weather, WeatherError> {
        let city = lookup_city(&self.cities, city_id)?;
        fetch_city_weather(
            &self.provider,
            city,
            target_datetime,
            None,
            None,
            None,
            None,
        )
        .await
    }
}

pub(crate) fn lookup_city<'a>(
    cities: &'a CityRepository,
    city_id: &str,
) -> Result<&'a City, WeatherError> {
    let city = cities
        .get_by_id(city_id)
        .ok_or_else(|| WeatherError::CityNotFound {
            city_id: city_id.to_string(),
        })?;
    if !city.has_coordinates() {
        return Err(WeatherError::CoordinatesNotFound {
            city_id: city_id.to_string(),
        });
    }
    Ok(city)
}

/// Shared city pipeline; the regional use case passes its prefetched maps
/// and staging buffers through here.
pub(crate) async fn fetch_city_weather(
    provider: &OpenMeteoProvider,
    city: &City,
    target_datetime: Option<DateTime<Tz>>,
    prefetched_hourly: Option<&Prefetched>,
    prefetched_daily: Option<&Prefetched>,
    hourly_writes: Option<&StagedWrites>,
    daily_writes: Option<&StagedWrites>,
) -> Result<Weather, WeatherError> {
    let coordinates = city
        .coordinates
        .ok_or_else(|| WeatherError::CoordinatesNotFound {
            city_id: city.id.clone(),
        })?;

    let (hourly, daily) = tokio::join!(
        provider.get_hourly_forecast(
            coordinates.latitude,
            coordinates.longitude,
            &city.id,
            openmeteo::MAX_FORECAST_HOURS,
            prefetched_hourly,
            hourly_writes,
        ),
        provider.get_daily_forecast(
            coordinates.latitude,
            coordinates.longitude,
            &city.id,
            openmeteo::MAX_FORECAST_DAYS,
            prefetched_daily,
            daily_writes,
        ),
    );
    let hourly = hourly?;
    let daily = daily?;

    let mut weather =
        extract_current_weather_from_hourly(&hourly, &daily, &city.id, &city.name, target_datetime)?;

    weather.weather_alert = generate_alerts(&hourly, &daily, target_datetime, DAYS_LIMIT_DEFAULT);
    weather.daily_aggregates = build_daily_aggregates(&hourly, &daily, target_datetime);

    Ok(weather)
}

/// Aggregate rain, wind and temperature metrics for the target day,
/// preferring hourly data and letting the daily record raise the maxima.
#[must_use]
pub fn build_daily_aggregates(
    hourly: &[HourlyForecast],
    daily: &[DailyForecast],
    target_datetime: Option<DateTime<Tz>>,
) -> Option<DailyAggregatedMetrics> {
    if hourly.is_empty() && daily.is_empty() {
        return None;
    }

    let target =
        target_datetime.unwrap_or_else(|| Utc::now().with_timezone(&SAO_PAULO));
    let target_date = target.date_naive().to_string();

    let hourly_for_day: Vec<&HourlyForecast> = hourly
        .iter()
        .filter(|hour| hour.timestamp.starts_with(&target_date))
        .collect();

    let mut rain_volume: f64 = hourly_for_day.iter().map(|h| h.precipitation).sum();
    let mut rain_intensity_max = hourly_for_day
        .iter()
        .map(|h| h.rainfall_intensity)
        .fold(0.0, f64::max);
    let mut rain_probability_max = hourly_for_day
        .iter()
        .map(|h| h.precipitation_probability)
        .fold(0.0, f64::max);
    let mut wind_speed_max = hourly_for_day
        .iter()
        .map(|h| h.wind_speed)
        .fold(0.0, f64::max);

    let daily_match = daily.iter().find(|day| day.date == target_date);
    let (temp_min, temp_max) = daily_match.map_or((0.0, 0.0), |d| (d.temp_min, d.temp_max));
    if let Some(day) = daily_match {
        rain_volume = rain_volume.max(day.precipitation_mm);
        rain_intensity_max = rain_intensity_max.max(day.rainfall_intensity);
        rain_probability_max = rain_probability_max.max(day.rain_probability);
        wind_speed_max = wind_speed_max.max(day.wind_speed_max);
    }

    Some(DailyAggregatedMetrics {
        date: target_date,
        rain_volume,
        rain_intensity_max,
        rain_probability_max,
        wind_speed_max,
        temp_min,
        temp_max,
    })
}
