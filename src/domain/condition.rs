//! Proprietary condition-code taxonomy.
//!
//! Classification works from derived metrics (composite rainfall intensity,
//! precipitation volume, wind, clouds, visibility, temperature) instead of
//! passing upstream WMO or OpenWeather codes through to clients.

/// Heavy-rain anchor in mm/h: 30 mm/h at 100% probability scores 100.
pub const RAIN_INTENSITY_REFERENCE: f64 = 30.0;

// Clear sky and clouds (100-399)
pub const CLEAR: u16 = 100;
pub const PARTLY_CLOUDY: u16 = 200;
pub const CLOUDY: u16 = 300;
pub const OVERCAST: u16 = 350;

// Drizzle (400-499)
pub const LIGHT_DRIZZLE: u16 = 400;
pub const MODERATE_DRIZZLE: u16 = 410;
pub const HEAVY_DRIZZLE: u16 = 420;

// Rain (500-599)
pub const LIGHT_RAIN: u16 = 500;
pub const MODERATE_RAIN: u16 = 510;
pub const HEAVY_RAIN: u16 = 520;
pub const VERY_HEAVY_RAIN: u16 = 530;

// Storm (600-699)
pub const STORM_LIGHT: u16 = 600;
pub const STORM_MODERATE: u16 = 610;
pub const STORM_HEAVY: u16 = 620;
pub const STORM_SEVERE: u16 = 630;

// Fog (700-799)
pub const FOG_LIGHT: u16 = 700;
pub const FOG: u16 = 710;
pub const FOG_HEAVY: u16 = 720;

// Haze (800-899)
pub const HAZE: u16 = 800;

// Snow (900-999), rare in Brazil but kept for completeness
pub const LIGHT_SNOW: u16 = 900;
pub const MODERATE_SNOW: u16 = 910;
pub const HEAVY_SNOW: u16 = 920;

/// Composite rainfall intensity in [0, 100].
///
/// Collapses volume (mm/h) and probability (%) into one monotone score.
/// Zero volume scores zero regardless of probability, which resolves the
/// "100% probability but 0 mm" ambiguity.
#[must_use]
pub fn rainfall_intensity(probability_pct: f64, volume_mm_h: f64) -> f64 {
    if volume_mm_h <= 0.0 {
        return 0.0;
    }
    let composite =
        (volume_mm_h * probability_pct / 100.0) / RAIN_INTENSITY_REFERENCE * 100.0;
    composite.clamp(0.0, 100.0)
}

/// Classify a condition into the proprietary code space.
///
/// Priority cascade, first match wins: storm, rain, drizzle, fog, snow,
/// haze, cloud cover. Total over all inputs.
#[must_use]
pub fn classify_condition(
    rainfall_intensity: f64,
    precipitation: f64,
    wind_speed: f64,
    clouds: f64,
    visibility: f64,
    temperature: f64,
    rain_probability: f64,
) -> (u16, &'static str) {
    // Storm: high composite intensity combined with strong wind
    if rainfall_intensity >= 40.0 && wind_speed >= 30.0 {
        return if rainfall_intensity >= 70.0 || wind_speed >= 60.0 {
            (STORM_SEVERE, "Tempestade severa")
        } else if rainfall_intensity >= 55.0 || wind_speed >= 45.0 {
            (STORM_HEAVY, "Tempestade forte")
        } else if rainfall_intensity >= 45.0 {
            (STORM_MODERATE, "Tempestade moderada")
        } else {
            (STORM_LIGHT, "Tempestade leve")
        };
    }

    // Rain, banded by volume and composite intensity
    if rainfall_intensity >= 25.0 {
        return if precipitation >= 50.0 || rainfall_intensity >= 60.0 {
            (VERY_HEAVY_RAIN, "Chuva muito forte")
        } else if precipitation >= 10.0 || rainfall_intensity >= 40.0 {
            (HEAVY_RAIN, "Chuva forte")
        } else if precipitation >= 2.5 || rainfall_intensity >= 30.0 {
            (MODERATE_RAIN, "Chuva moderada")
        } else {
            (LIGHT_RAIN, "Chuva leve")
        };
    }

    // Drizzle: some volume, or likely rain with nonzero intensity
    if precipitation > 0.0 || (rain_probability >= 60.0 && rainfall_intensity > 0.0) {
        return if precipitation >= 2.5 {
            (HEAVY_DRIZZLE, "Garoa intensa")
        } else if precipitation >= 0.5 {
            (MODERATE_DRIZZLE, "Garoa moderada")
        } else {
            (LIGHT_DRIZZLE, "Garoa leve")
        };
    }

    // Fog bands by visibility
    if visibility < 3000.0 {
        return if visibility < 500.0 {
            (FOG_HEAVY, "Nevoeiro denso")
        } else if visibility < 1000.0 {
            (FOG, "Neblina")
        } else {
            (FOG_LIGHT, "Neblina leve")
        };
    }

    // Snow: cold plus precipitation
    if temperature < 2.0 && precipitation > 0.0 {
        return if precipitation >= 10.0 {
            (HEAVY_SNOW, "Neve forte")
        } else if precipitation >= 2.5 {
            (MODERATE_SNOW, "Neve moderada")
        } else {
            (LIGHT_SNOW, "Neve leve")
        };
    }

    // Dry haze: reduced visibility without precipitation
    if visibility < 5000.0 && precipitation == 0.0 {
        return (HAZE, "Névoa seca");
    }

    // Cloud cover fallback
    if clouds >= 85.0 {
        (OVERCAST, "Céu encoberto")
    } else if clouds >= 50.0 {
        (CLOUDY, "Nublado")
    } else if clouds >= 20.0 {
        (PARTLY_CLOUDY, "Parcialmente nublado")
    } else {
        (CLEAR, "Céu limpo")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_is_zero_without_volume() {
        assert_eq!(rainfall_intensity(100.0, 0.0), 0.0);
        assert_eq!(rainfall_intensity(100.0, -1.0), 0.0);
    }

    #[test]
    fn intensity_caps_at_100() {
        assert_eq!(rainfall_intensity(100.0, 1000.0), 100.0);
        // 30mm/h at 100% hits the reference exactly
        assert_eq!(rainfall_intensity(100.0, 30.0), 100.0);
    }

    #[test]
    fn intensity_formula_matches_reference() {
        // (15 * 0.5) / 30 * 100 = 25
        assert!((rainfall_intensity(50.0, 15.0) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn intensity_handles_negative_probability() {
        assert_eq!(rainfall_intensity(-10.0, 5.0), 0.0);
    }

    #[test]
    fn storm_wins_over_heavy_rain() {
        // Intensity 60 alone would be VERY_HEAVY_RAIN; with wind it is storm
        let (code, _) = classify_condition(60.0, 18.0, 35.0, 90.0, 10_000.0, 25.0, 100.0);
        assert_eq!(code, STORM_HEAVY);

        let (code, desc) = classify_condition(60.0, 18.0, 10.0, 90.0, 10_000.0, 25.0, 100.0);
        assert_eq!(code, VERY_HEAVY_RAIN);
        assert_eq!(desc, "Chuva muito forte");
    }

    #[test]
    fn storm_severity_bands() {
        let (code, _) = classify_condition(70.0, 20.0, 30.0, 90.0, 10_000.0, 25.0, 100.0);
        assert_eq!(code, STORM_SEVERE);
        let (code, _) = classify_condition(40.0, 5.0, 65.0, 90.0, 10_000.0, 25.0, 100.0);
        assert_eq!(code, STORM_SEVERE);
        let (code, _) = classify_condition(45.0, 5.0, 30.0, 90.0, 10_000.0, 25.0, 100.0);
        assert_eq!(code, STORM_MODERATE);
        let (code, _) = classify_condition(40.0, 5.0, 30.0, 90.0, 10_000.0, 25.0, 100.0);
        assert_eq!(code, STORM_LIGHT);
    }

    #[test]
    fn drizzle_on_probability_without_volume_needs_intensity() {
        // No volume and zero intensity: falls through to cloud cover
        let (code, _) = classify_condition(0.0, 0.0, 5.0, 10.0, 10_000.0, 25.0, 90.0);
        assert_eq!(code, CLEAR);
        // Nonzero intensity with high probability drizzles
        let (code, _) = classify_condition(2.0, 0.0, 5.0, 10.0, 10_000.0, 25.0, 90.0);
        assert_eq!(code, LIGHT_DRIZZLE);
    }

    #[test]
    fn fog_bands_by_visibility() {
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 10.0, 400.0, 20.0, 0.0).0, FOG_HEAVY);
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 10.0, 900.0, 20.0, 0.0).0, FOG);
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 10.0, 2500.0, 20.0, 0.0).0, FOG_LIGHT);
    }

    #[test]
    fn snow_requires_cold_and_precipitation() {
        let (code, _) = classify_condition(10.0, 1.0, 5.0, 50.0, 10_000.0, 1.0, 50.0);
        assert_eq!(code, LIGHT_SNOW);
        // Warm air with the same precipitation is drizzle territory
        let (code, _) = classify_condition(10.0, 1.0, 5.0, 50.0, 10_000.0, 20.0, 50.0);
        assert_eq!(code, MODERATE_DRIZZLE);
    }

    #[test]
    fn haze_requires_dry_air() {
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 10.0, 4000.0, 25.0, 0.0).0, HAZE);
    }

    #[test]
    fn cloud_cover_bands() {
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 90.0, 10_000.0, 25.0, 0.0).0, OVERCAST);
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 60.0, 10_000.0, 25.0, 0.0).0, CLOUDY);
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 30.0, 10_000.0, 25.0, 0.0).0, PARTLY_CLOUDY);
        assert_eq!(classify_condition(0.0, 0.0, 5.0, 5.0, 10_000.0, 25.0, 0.0).0, CLEAR);
    }
}
