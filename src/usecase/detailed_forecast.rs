//! Detailed single-city forecast: OpenWeather current conditions plus the
//! Open-Meteo extended outlooks, fetched in parallel with graded
//! degradation.

use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use log::warn;

use super::city_weather::lookup_city;
use crate::data::municipalities::CityRepository;
use crate::data::openmeteo::{self, OpenMeteoProvider};
use crate::data::openweather::{OpenWeatherProvider, enrich_current_with_hourly};
use crate::domain::alerts::generator::{DAYS_LIMIT_DEFAULT, generate_alerts};
use crate::domain::errors::WeatherError;
use crate::domain::weather::ExtendedForecast;

pub struct GetDetailedForecast {
    cities: Arc<CityRepository>,
    openweather: Arc<OpenWeatherProvider>,
    openmeteo: Arc<OpenMeteoProvider>,
}

impl GetDetailedForecast {
    #[must_use]
    pub fn new(
        cities: Arc<CityRepository>,
        openweather: Arc<OpenWeatherProvider>,
        openmeteo: Arc<OpenMeteoProvider>,
    ) -> Self {
        Self {
            cities,
            openweather,
            openmeteo,
        }
    }

    /// Failure grading: current-weather failure propagates; an hourly
    /// failure falls back to the OpenWeather-only current view; a daily
    /// failure clears `extended_available`.
    pub async fn execute(
        &self,
        city_id: &str,
        target_datetime: Option<DateTime<Tz>>,
    ) -> Result<ExtendedForecast, WeatherError> {
        let city = lookup_city(&self.cities, city_id)?;
        let coordinates = city
            .coordinates
            .expect("lookup_city guarantees coordinates");

        let (current, daily, hourly) = tokio::join!(
            self.openweather.get_current_weather(
                coordinates.latitude,
                coordinates.longitude,
                &city.id,
                &city.name,
                target_datetime,
            ),
            self.openmeteo.get_daily_forecast(
                coordinates.latitude,
                coordinates.longitude,
                &city.id,
                openmeteo::MAX_FORECAST_DAYS,
                None,
                None,
            ),
            self.openmeteo.get_hourly_forecast(
                coordinates.latitude,
                coordinates.longitude,
                &city.id,
                openmeteo::MAX_FORECAST_HOURS,
                None,
                None,
            ),
        );

        let hourly = match hourly {
            Ok(hourly) => hourly,
            Err(err) => {
                warn!("hourly forecast unavailable for {city_id}: {err}");
                Vec::new()
            }
        };

        let mut current = current?;

        if !hourly.is_empty()
            && let Some(enriched) = enrich_current_with_hourly(&current, &hourly, target_datetime)
        {
            current = enriched;
        }

        let (daily, extended_available) = match daily {
            Ok(daily) => (daily, true),
            Err(err) => {
                warn!("extended forecast unavailable for {city_id}: {err}");
                (Vec::new(), false)
            }
        };

        current.weather_alert =
            generate_alerts(&hourly, &daily, target_datetime, DAYS_LIMIT_DEFAULT);

        Ok(ExtendedForecast {
            city_id: city.id.clone(),
            city_name: city.name.clone(),
            city_state: city.state.clone(),
            current_weather: current,
            daily_forecasts: daily,
            hourly_forecasts: hourly,
            extended_available,
        })
    }
}
