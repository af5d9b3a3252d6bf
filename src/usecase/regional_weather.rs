//! Regional fan-out: batch cache prefetch, semaphore-bounded concurrent
//! city pipelines, staged batch cache writes, partial-failure tolerance.

use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use futures::future::join_all;
use log::{info, warn};
use tokio::sync::Semaphore;

use super::city_weather::{fetch_city_weather, lookup_city};
use crate::data::cache::{CacheStore, TTL_DAILY_SECS, TTL_HOURLY_SECS};
use crate::data::municipalities::CityRepository;
use crate::data::openmeteo::{OpenMeteoProvider, daily_cache_key, hourly_cache_key};
use crate::data::{Prefetched, drain_staged, staged_writes};
use crate::domain::weather::Weather;

/// Upper bound on concurrent city pipelines.
pub const FAN_OUT_LIMIT: usize = 50;

pub struct GetRegionalWeather {
    cities: Arc<CityRepository>,
    provider: Arc<OpenMeteoProvider>,
    cache: Arc<CacheStore>,
}

impl GetRegionalWeather {
    #[must_use]
    pub fn new(
        cities: Arc<CityRepository>,
        provider: Arc<OpenMeteoProvider>,
        cache: Arc<CacheStore>,
    ) -> Self {
        Self {
            cities,
            provider,
            cache,
        }
    }

    /// Fetch weather for every requested city. Per-city failures are
    /// logged and dropped; an empty result is a valid success. Output
    /// order is unspecified and duplicate ids collapse to one entry.
    pub async fn execute(
        &self,
        city_ids: &[String],
        target_datetime: Option<DateTime<Tz>>,
    ) -> Vec<Weather> {
        let mut unique_ids: Vec<&String> = Vec::with_capacity(city_ids.len());
        for id in city_ids {
            if !unique_ids.contains(&id) {
                unique_ids.push(id);
            }
        }

        info!("regional fetch: {} cities requested", unique_ids.len());

        let (prefetched_hourly, prefetched_daily) = self.prefetch(&unique_ids).await;
        let hourly_writes = staged_writes();
        let daily_writes = staged_writes();

        let semaphore = Arc::new(Semaphore::new(FAN_OUT_LIMIT));
        let tasks = unique_ids.iter().map(|city_id| {
            let semaphore = Arc::clone(&semaphore);
            let provider = Arc::clone(&self.provider);
            let cities = Arc::clone(&self.cities);
            let prefetched_hourly = &prefetched_hourly;
            let prefetched_daily = &prefetched_daily;
            let hourly_writes = &hourly_writes;
            let daily_writes = &daily_writes;
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closes");
                let city = lookup_city(&cities, city_id.as_str())?;
                fetch_city_weather(
                    &provider,
                    city,
                    target_datetime,
                    Some(prefetched_hourly),
                    Some(prefetched_daily),
                    Some(hourly_writes),
                    Some(daily_writes),
                )
                .await
            }
        });

        let results = join_all(tasks).await;

        let mut weather_data = Vec::with_capacity(results.len());
        let mut failures = 0;
        for (city_id, result) in unique_ids.iter().zip(results) {
            match result {
                Ok(weather) => weather_data.push(weather),
                Err(err) => {
                    failures += 1;
                    warn!("dropping city {city_id} from regional result: {err}");
                }
            }
        }

        let staged_hourly = drain_staged(&hourly_writes);
        let staged_daily = drain_staged(&daily_writes);
        tokio::join!(
            self.cache.batch_set(&staged_hourly, TTL_HOURLY_SECS),
            self.cache.batch_set(&staged_daily, TTL_DAILY_SECS),
        );

        info!(
            "regional fetch done: {} returned, {} dropped",
            weather_data.len(),
            failures
        );
        weather_data
    }

    async fn prefetch(&self, city_ids: &[&String]) -> (Prefetched, Prefetched) {
        if !self.cache.is_enabled() || city_ids.is_empty() {
            return (Prefetched::new(), Prefetched::new());
        }

        let hourly_keys: Vec<String> = city_ids
            .iter()
            .map(|id| hourly_cache_key(id.as_str()))
            .collect();
        let daily_keys: Vec<String> = city_ids
            .iter()
            .map(|id| daily_cache_key(id.as_str()))
            .collect();

        let (hourly, daily) = tokio::join!(
            self.cache.batch_get(&hourly_keys),
            self.cache.batch_get(&daily_keys),
        );
        (hourly, daily)
    }
}
