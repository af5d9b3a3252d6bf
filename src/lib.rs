#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod resilience;
pub mod usecase;

use std::sync::Arc;

use anyhow::{Context, Result};

use cli::{Cli, Command, parse_target_datetime};
use config::Config;
use data::cache::CacheStore;
use data::municipalities::CityRepository;
use data::openmeteo::OpenMeteoProvider;
use data::openweather::OpenWeatherProvider;
use usecase::city_weather::GetCityWeather;
use usecase::detailed_forecast::GetDetailedForecast;
use usecase::neighbor_cities::GetNeighborCities;
use usecase::regional_weather::GetRegionalWeather;

/// Local-dev entry point: wire the process singletons, run one use case
/// and print the result as JSON.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env();

    let cities = Arc::new(
        CityRepository::load(&config.municipalities_path)
            .context("municipality table is required")?,
    );
    let cache = Arc::new(CacheStore::open(&config.cache_db_path, config.cache_enabled));
    let openmeteo = Arc::new(OpenMeteoProvider::new(Arc::clone(&cache)));
    let openweather = Arc::new(OpenWeatherProvider::new(
        Arc::clone(&cache),
        config.openweather_api_key.clone(),
    ));

    match cli.command {
        Command::City {
            city_id,
            date,
            time,
        } => {
            let target = parse_target_datetime(date.as_deref(), time.as_deref())?;
            let weather = GetCityWeather::new(cities, openmeteo)
                .execute(&city_id, target)
                .await?;
            print_json(&weather)
        }
        Command::Regional { city_ids } => {
            let weather = GetRegionalWeather::new(cities, openmeteo, cache)
                .execute(&city_ids, None)
                .await;
            print_json(&weather)
        }
        Command::Detailed { city_id } => {
            let forecast = GetDetailedForecast::new(cities, openweather, openmeteo)
                .execute(&city_id, None)
                .await?;
            print_json(&forecast)
        }
        Command::Neighbors { city_id, radius } => {
            let neighbors = GetNeighborCities::new(cities).execute(&city_id, radius)?;
            print_json(&neighbors)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize result")?
    );
    Ok(())
}
