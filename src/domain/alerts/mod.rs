pub mod generator;
pub mod rules;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value};

/// Closed alert vocabulary. Stable contract with clients: codes are never
/// renamed and no two alerts in one output share a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCode {
    Clear,
    CloudCover,
    LightRain,
    ModerateRain,
    HeavyRain,
    Drizzle,
    Storm,
    StormRain,
    RainExpected,
    HeavyRainDay,
    StrongWindDay,
    ExtremeCold,
    ExtremeHot,
    ExtremeUv,
    LowVisibility,
    TempDrop,
    TempRise,
}

impl AlertCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "CLEAR",
            Self::CloudCover => "CLOUD_COVER",
            Self::LightRain => "LIGHT_RAIN",
            Self::ModerateRain => "MODERATE_RAIN",
            Self::HeavyRain => "HEAVY_RAIN",
            Self::Drizzle => "DRIZZLE",
            Self::Storm => "STORM",
            Self::StormRain => "STORM_RAIN",
            Self::RainExpected => "RAIN_EXPECTED",
            Self::HeavyRainDay => "HEAVY_RAIN_DAY",
            Self::StrongWindDay => "STRONG_WIND_DAY",
            Self::ExtremeCold => "EXTREME_COLD",
            Self::ExtremeHot => "EXTREME_HOT",
            Self::ExtremeUv => "EXTREME_UV",
            Self::LowVisibility => "LOW_VISIBILITY",
            Self::TempDrop => "TEMP_DROP",
            Self::TempRise => "TEMP_RISE",
        }
    }

    /// Codes eligible for rain-end enrichment.
    #[must_use]
    pub const fn is_rain(self) -> bool {
        matches!(
            self,
            Self::Drizzle
                | Self::LightRain
                | Self::ModerateRain
                | Self::HeavyRain
                | Self::Storm
                | Self::StormRain
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Alert,
    Danger,
}

/// Structured alert attached to a Weather aggregate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAlert {
    pub code: AlertCode,
    pub severity: AlertSeverity,
    pub description: String,
    pub timestamp: DateTime<Tz>,
    pub details: Map<String, Value>,
}

/// Collapse a `json!({..})` literal into the details map shape.
pub(crate) fn details_from(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Round to one decimal for detail payloads.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_from_info_to_danger() {
        assert!(AlertSeverity::Info < AlertSeverity::Warning);
        assert!(AlertSeverity::Warning < AlertSeverity::Alert);
        assert!(AlertSeverity::Alert < AlertSeverity::Danger);
    }

    #[test]
    fn rain_codes_are_enrichable() {
        assert!(AlertCode::Drizzle.is_rain());
        assert!(AlertCode::Storm.is_rain());
        assert!(!AlertCode::StrongWindDay.is_rain());
        assert!(!AlertCode::TempDrop.is_rain());
    }

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&AlertCode::HeavyRainDay).expect("serialize");
        assert_eq!(json, "\"HEAVY_RAIN_DAY\"");
        assert_eq!(AlertCode::HeavyRainDay.as_str(), "HEAVY_RAIN_DAY");
    }
}
