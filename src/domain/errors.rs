use thiserror::Error;

/// Typed failure taxonomy shared by use cases and providers.
///
/// The handler layer maps `kind()` into the wire error body and
/// `status_code()` into the HTTP status. Cache failures never surface
/// here: the cache boundary reduces them to misses.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("city {city_id} not found")]
    CityNotFound { city_id: String },

    #[error("city {city_id} has no coordinates")]
    CoordinatesNotFound { city_id: String },

    #[error("radius must be between {min} and {max} km, got {radius}")]
    InvalidRadius { radius: f64, min: f64, max: f64 },

    #[error("invalid date/time: {value}")]
    InvalidDateTime { value: String },

    #[error("no weather data available")]
    WeatherDataNotFound,

    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl WeatherError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CityNotFound { .. } => "CityNotFound",
            Self::CoordinatesNotFound { .. } => "CoordinatesNotFound",
            Self::InvalidRadius { .. } => "InvalidRadius",
            Self::InvalidDateTime { .. } => "InvalidDateTime",
            Self::WeatherDataNotFound => "WeatherDataNotFound",
            Self::UpstreamStatus { .. } => "UpstreamError",
            Self::Http(_) => "UpstreamError",
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::CityNotFound { .. }
            | Self::CoordinatesNotFound { .. }
            | Self::WeatherDataNotFound => 404,
            Self::InvalidRadius { .. } | Self::InvalidDateTime { .. } => 400,
            Self::UpstreamStatus { .. } | Self::Http(_) => 502,
        }
    }
}
