//! Environment-driven configuration, read once at startup.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_CACHE_DB_PATH: &str = "data/cache.sqlite";
pub const DEFAULT_MUNICIPALITIES_PATH: &str = "data/municipalities.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub openweather_api_key: String,
    pub cache_enabled: bool,
    pub cache_db_path: PathBuf,
    pub municipalities_path: PathBuf,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            openweather_api_key: env::var("OPENWEATHER_API_KEY").unwrap_or_default(),
            cache_enabled: env::var("CACHE_ENABLED")
                .map_or(true, |value| is_truthy(&value)),
            cache_db_path: env::var("CACHE_DB_PATH")
                .map_or_else(|_| PathBuf::from(DEFAULT_CACHE_DB_PATH), PathBuf::from),
            municipalities_path: env::var("MUNICIPALITIES_PATH")
                .map_or_else(|_| PathBuf::from(DEFAULT_MUNICIPALITIES_PATH), PathBuf::from),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}
