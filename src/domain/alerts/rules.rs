//! Per-class alert rules. Each rule inspects a single forecast point and
//! emits at most one alert; the generator handles windowing, dedup and
//! enrichment.

use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::json;

use super::{AlertCode, AlertSeverity, WeatherAlert, details_from, round1};

pub const WIND_SPEED_WARNING: f64 = 40.0;
pub const WIND_SPEED_DANGER: f64 = 60.0;
pub const VISIBILITY_WARNING: f64 = 1000.0;
pub const VISIBILITY_DANGER: f64 = 500.0;
pub const TEMP_EXTREME_COLD: f64 = 5.0;
pub const TEMP_EXTREME_HOT: f64 = 35.0;
pub const UV_EXTREME: f64 = 11.0;
pub const RAIN_EXPECTED_PROBABILITY: f64 = 70.0;

/// Normalized view of one forecast point, hourly or daily.
#[derive(Debug, Clone)]
pub struct PointConditions {
    /// Raw upstream code (WMO or OpenWeather); 0 when unavailable.
    pub provider_code: u16,
    pub rain_probability: f64,
    pub rain_1h: f64,
    pub rainfall_intensity: f64,
    pub wind_speed: f64,
    pub temperature: f64,
    pub visibility: f64,
    pub timestamp: DateTime<Tz>,
}

/// Run every point rule, collecting emitted alerts.
#[must_use]
pub fn point_alerts(point: &PointConditions) -> Vec<WeatherAlert> {
    [
        rain_alert(point),
        wind_alert(point.wind_speed, point.timestamp),
        visibility_alert(point.visibility, point.timestamp),
        temperature_alert(point.temperature, point.timestamp),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// WMO 95-99 or OpenWeather 2xx.
#[must_use]
pub const fn is_storm_code(code: u16) -> bool {
    matches!(code, 95..=99 | 200..=299)
}

/// Any upstream code that signals precipitation: OpenWeather 2xx-6xx,
/// WMO drizzle/rain/shower/thunderstorm bands.
#[must_use]
pub const fn is_precipitation_code(code: u16) -> bool {
    matches!(code, 200..=699 | 51..=57 | 61..=67 | 80..=82 | 95..=99)
}

fn rain_alert(point: &PointConditions) -> Option<WeatherAlert> {
    let intensity = point.rainfall_intensity;
    let timestamp = point.timestamp;

    let mut details = details_from(json!({
        "probability_percent": round1(point.rain_probability),
        "intensity": round1(intensity),
    }));
    if point.rain_1h > 0.0 {
        details.insert("rain_mm_h".to_string(), json!(round1(point.rain_1h)));
    }

    // A thunderstorm code upgrades the point to STORM regardless of the
    // computed intensity band.
    if is_storm_code(point.provider_code) {
        return Some(WeatherAlert {
            code: AlertCode::Storm,
            severity: AlertSeverity::Danger,
            description: "⛈️ Tempestade prevista".to_string(),
            timestamp,
            details,
        });
    }

    if intensity >= 60.0 {
        return Some(WeatherAlert {
            code: AlertCode::HeavyRain,
            severity: AlertSeverity::Alert,
            description: format!("🌧️ Chuva forte prevista ({:.1}mm/h)", point.rain_1h),
            timestamp,
            details,
        });
    }
    if intensity >= 25.0 {
        return Some(WeatherAlert {
            code: AlertCode::ModerateRain,
            severity: AlertSeverity::Warning,
            description: format!("🌧️ Chuva moderada prevista ({:.1}mm/h)", point.rain_1h),
            timestamp,
            details,
        });
    }
    if intensity >= 10.0 {
        return Some(WeatherAlert {
            code: AlertCode::LightRain,
            severity: AlertSeverity::Info,
            description: format!("🌦️ Chuva leve prevista ({:.1}mm/h)", point.rain_1h),
            timestamp,
            details,
        });
    }
    if intensity >= 1.0 {
        return Some(WeatherAlert {
            code: AlertCode::Drizzle,
            severity: AlertSeverity::Info,
            description: "🌦️ Garoa prevista".to_string(),
            timestamp,
            details,
        });
    }

    // No measured volume yet, but the provider flags rain and the
    // probability is high: announce it without a band.
    if point.rain_1h <= 0.0
        && point.rain_probability >= RAIN_EXPECTED_PROBABILITY
        && is_precipitation_code(point.provider_code)
    {
        return Some(WeatherAlert {
            code: AlertCode::RainExpected,
            severity: AlertSeverity::Info,
            description: format!(
                "🌧️ Chuva esperada ({:.0}% de probabilidade)",
                point.rain_probability
            ),
            timestamp,
            details,
        });
    }

    None
}

fn wind_alert(wind_speed: f64, timestamp: DateTime<Tz>) -> Option<WeatherAlert> {
    if wind_speed < WIND_SPEED_WARNING {
        return None;
    }
    let (severity, description) = if wind_speed >= WIND_SPEED_DANGER {
        (
            AlertSeverity::Alert,
            format!("💨 Ventos muito fortes previstos ({wind_speed:.0} km/h)"),
        )
    } else {
        (
            AlertSeverity::Warning,
            format!("💨 Ventos fortes previstos ({wind_speed:.0} km/h)"),
        )
    };
    Some(WeatherAlert {
        code: AlertCode::StrongWindDay,
        severity,
        description,
        timestamp,
        details: details_from(json!({
            "date": timestamp.date_naive().to_string(),
            "wind_speed_kmh": round1(wind_speed),
        })),
    })
}

fn visibility_alert(visibility: f64, timestamp: DateTime<Tz>) -> Option<WeatherAlert> {
    if visibility >= VISIBILITY_WARNING {
        return None;
    }
    let (severity, description) = if visibility < VISIBILITY_DANGER {
        (
            AlertSeverity::Alert,
            format!("🌫️ Visibilidade muito baixa ({visibility:.0} m)"),
        )
    } else {
        (
            AlertSeverity::Warning,
            format!("🌫️ Visibilidade reduzida ({visibility:.0} m)"),
        )
    };
    Some(WeatherAlert {
        code: AlertCode::LowVisibility,
        severity,
        description,
        timestamp,
        details: details_from(json!({ "visibility_m": visibility.round() })),
    })
}

fn temperature_alert(temperature: f64, timestamp: DateTime<Tz>) -> Option<WeatherAlert> {
    if temperature < TEMP_EXTREME_COLD {
        return Some(WeatherAlert {
            code: AlertCode::ExtremeCold,
            severity: AlertSeverity::Warning,
            description: format!("🥶 Frio extremo previsto ({temperature:.0}°C)"),
            timestamp,
            details: details_from(json!({ "temperature_c": round1(temperature) })),
        });
    }
    if temperature > TEMP_EXTREME_HOT {
        return Some(WeatherAlert {
            code: AlertCode::ExtremeHot,
            severity: AlertSeverity::Warning,
            description: format!("🥵 Calor extremo previsto ({temperature:.0}°C)"),
            timestamp,
            details: details_from(json!({ "temperature_c": round1(temperature) })),
        });
    }
    None
}

/// Daily-only rule: extreme UV index.
#[must_use]
pub fn uv_alert(uv_index: f64, timestamp: DateTime<Tz>) -> Option<WeatherAlert> {
    if uv_index < UV_EXTREME {
        return None;
    }
    Some(WeatherAlert {
        code: AlertCode::ExtremeUv,
        severity: AlertSeverity::Warning,
        description: format!("☀️ Índice UV extremo ({uv_index:.0})"),
        timestamp,
        details: details_from(json!({
            "date": timestamp.date_naive().to_string(),
            "uv_index": round1(uv_index),
        })),
    })
}

/// Daily-only rule: high accumulated rain over the day.
#[must_use]
pub fn heavy_rain_day_alert(
    precipitation_mm: f64,
    rain_probability: f64,
    rainfall_intensity: f64,
    timestamp: DateTime<Tz>,
) -> Option<WeatherAlert> {
    if precipitation_mm <= 20.0 || rain_probability <= 60.0 || rainfall_intensity < 25.0 {
        return None;
    }
    let severity = if precipitation_mm >= 50.0 {
        AlertSeverity::Alert
    } else {
        AlertSeverity::Warning
    };
    Some(WeatherAlert {
        code: AlertCode::HeavyRainDay,
        severity,
        description: format!("🌧️ Chuva forte prevista ({precipitation_mm:.0}mm acumulados)"),
        timestamp,
        details: details_from(json!({
            "date": timestamp.date_naive().to_string(),
            "precipitation_mm": round1(precipitation_mm),
            "rain_probability": rain_probability.round(),
            "intensity": round1(rainfall_intensity),
        })),
    })
}
