//! Alert generation over combined hourly and daily forecast sequences.
//!
//! One pass over the window collects per-code alerts and per-day
//! temperature extremes; enrichment (rain end, temperature trends) runs on
//! the accumulated state afterwards.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;

use super::rules::{self, PointConditions};
use super::{AlertCode, AlertSeverity, WeatherAlert, details_from, round1};
use crate::domain::forecast::{DailyForecast, HourlyForecast, SAO_PAULO};

/// Days analyzed by default.
pub const DAYS_LIMIT_DEFAULT: i64 = 7;

/// A calendar day counts as covered by hourly data when it has at least
/// this many hourly samples; daily forecasts only supplement the rest.
pub const HOURLY_DAY_COVERAGE_MIN: usize = 20;

/// Max temperature delta between two days that triggers a trend alert.
pub const TEMP_VARIATION_THRESHOLD: f64 = 8.0;

/// Trend analysis compares each day against at most this many following
/// days, keeping the pass linear.
const TREND_LOOKAHEAD_DAYS: usize = 3;

#[derive(Debug)]
struct ScanPoint {
    timestamp: DateTime<Tz>,
    conditions: PointConditions,
    daily: Option<DailyExtras>,
    temp_min: f64,
    temp_max: f64,
    from_hourly: bool,
}

#[derive(Debug)]
struct DailyExtras {
    uv_index: f64,
    precipitation_mm: f64,
    rain_probability: f64,
    rainfall_intensity: f64,
}

#[derive(Debug)]
struct DayExtremes {
    max: f64,
    first_timestamp: DateTime<Tz>,
}

/// Generate deduplicated alerts for the window `[now, now + days_limit]`.
///
/// `target_datetime` anchors the window; `None` means the current time in
/// America/Sao_Paulo. Hourly data wins for any day it covers; daily
/// forecasts fill the days beyond the hourly horizon. The output never
/// contains two alerts with the same code.
#[must_use]
pub fn generate_alerts(
    hourly: &[HourlyForecast],
    daily: &[DailyForecast],
    target_datetime: Option<DateTime<Tz>>,
    days_limit: i64,
) -> Vec<WeatherAlert> {
    let now = target_datetime.unwrap_or_else(|| Utc::now().with_timezone(&SAO_PAULO));
    let window_end = now + Duration::days(days_limit);

    let mut points = collect_points(hourly, daily);
    points.retain(|p| p.timestamp >= now && p.timestamp <= window_end);
    points.sort_by_key(|p| p.timestamp);

    if points.is_empty() {
        return Vec::new();
    }

    let mut alerts_by_code: HashMap<AlertCode, WeatherAlert> = HashMap::new();
    let mut day_extremes: BTreeMap<NaiveDate, DayExtremes> = BTreeMap::new();

    for point in &points {
        let mut emitted = rules::point_alerts(&point.conditions);
        if let Some(extras) = &point.daily {
            emitted.extend(rules::uv_alert(extras.uv_index, point.timestamp));
            emitted.extend(rules::heavy_rain_day_alert(
                extras.precipitation_mm,
                extras.rain_probability,
                extras.rainfall_intensity,
                point.timestamp,
            ));
        }

        for alert in emitted {
            match alerts_by_code.get(&alert.code) {
                Some(existing) if existing.timestamp <= alert.timestamp => {}
                _ => {
                    alerts_by_code.insert(alert.code, alert);
                }
            }
        }

        let date = point.timestamp.date_naive();
        let day = day_extremes.entry(date).or_insert(DayExtremes {
            max: f64::NEG_INFINITY,
            first_timestamp: point.timestamp,
        });
        day.max = day.max.max(point.temp_max).max(point.temp_min);
    }

    let hourly_intensities: Vec<(DateTime<Tz>, f64)> = points
        .iter()
        .filter(|p| p.from_hourly)
        .map(|p| (p.timestamp, p.conditions.rainfall_intensity))
        .collect();

    for alert in alerts_by_code.values_mut() {
        if alert.code.is_rain()
            && let Some(end) = find_rain_end(&hourly_intensities, alert.timestamp)
        {
            alert
                .details
                .insert("rain_ends_at".to_string(), json!(end.to_rfc3339()));
        }
    }

    for alert in temperature_trend_alerts(&day_extremes) {
        alerts_by_code.entry(alert.code).or_insert(alert);
    }

    let mut alerts: Vec<WeatherAlert> = alerts_by_code.into_values().collect();
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.code.as_str().cmp(b.code.as_str()))
    });
    alerts
}

fn collect_points(hourly: &[HourlyForecast], daily: &[DailyForecast]) -> Vec<ScanPoint> {
    let mut points = Vec::with_capacity(hourly.len() + daily.len());
    let mut hourly_samples_per_day: HashMap<NaiveDate, usize> = HashMap::new();

    for hour in hourly {
        let Some(timestamp) = hour.parsed_timestamp() else {
            continue;
        };
        *hourly_samples_per_day
            .entry(timestamp.date_naive())
            .or_default() += 1;

        points.push(ScanPoint {
            timestamp,
            conditions: PointConditions {
                provider_code: hour.provider_code,
                rain_probability: hour.precipitation_probability,
                rain_1h: hour.precipitation,
                rainfall_intensity: hour.rainfall_intensity,
                wind_speed: hour.wind_speed,
                temperature: hour.temperature,
                visibility: hour.visibility.unwrap_or(10_000.0),
                timestamp,
            },
            daily: None,
            temp_min: hour.temperature,
            temp_max: hour.temperature,
            from_hourly: true,
        });
    }

    for day in daily {
        let Some(timestamp) = day.start_of_day() else {
            continue;
        };
        let covered = hourly_samples_per_day
            .get(&timestamp.date_naive())
            .is_some_and(|count| *count >= HOURLY_DAY_COVERAGE_MIN);
        if covered {
            continue;
        }

        let precip_per_hour = if day.precipitation_hours > 0.0 {
            day.precipitation_mm / day.precipitation_hours
        } else {
            0.0
        };
        points.push(ScanPoint {
            timestamp,
            conditions: PointConditions {
                provider_code: 0,
                rain_probability: day.rain_probability,
                rain_1h: precip_per_hour,
                rainfall_intensity: day.rainfall_intensity,
                wind_speed: day.wind_speed_max,
                temperature: (day.temp_min + day.temp_max) / 2.0,
                visibility: day.visibility.unwrap_or(10_000.0),
                timestamp,
            },
            daily: Some(DailyExtras {
                uv_index: day.uv_index,
                precipitation_mm: day.precipitation_mm,
                rain_probability: day.rain_probability,
                rainfall_intensity: day.rainfall_intensity,
            }),
            temp_min: day.temp_min,
            temp_max: day.temp_max,
            from_hourly: false,
        });
    }

    points
}

/// Rain ends after two consecutive dry hours (intensity < 1); the end is
/// the last wet hour plus one hour. `None` when the horizon never shows
/// two consecutive dry hours.
fn find_rain_end(
    hourly: &[(DateTime<Tz>, f64)],
    start: DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let mut last_rain: Option<DateTime<Tz>> = None;
    let mut consecutive_dry = 0;

    for (timestamp, intensity) in hourly.iter().filter(|(ts, _)| *ts >= start) {
        if *intensity >= 1.0 {
            last_rain = Some(*timestamp);
            consecutive_dry = 0;
        } else {
            consecutive_dry += 1;
            if consecutive_dry >= 2
                && let Some(last) = last_rain
            {
                return Some(last + Duration::hours(1));
            }
        }
    }
    None
}

/// Compare each day's max against the next three days; keep the single
/// largest drop and the single largest rise at or beyond the 8 °C
/// threshold.
fn temperature_trend_alerts(day_extremes: &BTreeMap<NaiveDate, DayExtremes>) -> Vec<WeatherAlert> {
    if day_extremes.len() < 2 {
        return Vec::new();
    }

    let days: Vec<(&NaiveDate, &DayExtremes)> = day_extremes.iter().collect();
    let mut max_drop: Option<(f64, WeatherAlert)> = None;
    let mut max_rise: Option<(f64, WeatherAlert)> = None;

    for i in 0..days.len() - 1 {
        let (date_1, day_1) = days[i];
        for (date_2, day_2) in days
            .iter()
            .skip(i + 1)
            .take(TREND_LOOKAHEAD_DAYS)
        {
            let variation = day_2.max - day_1.max;
            if variation.abs() < TEMP_VARIATION_THRESHOLD {
                continue;
            }
            let days_between = (**date_2 - *date_1).num_days();

            let mut alert_time = day_1.first_timestamp;
            if alert_time.date_naive() != *date_1 {
                alert_time = crate::domain::forecast::date_start_of_day(&date_1.to_string())
                    .unwrap_or(alert_time);
            }

            let details = details_from(json!({
                "day_1_date": date_1.to_string(),
                "day_1_max_c": round1(day_1.max),
                "day_2_date": date_2.to_string(),
                "day_2_max_c": round1(day_2.max),
                "variation_c": round1(variation),
                "days_between": days_between,
            }));
            let day_word = if days_between == 1 { "dia" } else { "dias" };

            if variation < 0.0 {
                if max_drop
                    .as_ref()
                    .is_none_or(|(best, _)| variation.abs() > best.abs())
                {
                    max_drop = Some((
                        variation,
                        WeatherAlert {
                            code: AlertCode::TempDrop,
                            severity: AlertSeverity::Info,
                            description: format!(
                                "🌡️ Queda de temperatura ({:.0}°C em {} {})",
                                variation.abs(),
                                days_between,
                                day_word
                            ),
                            timestamp: alert_time,
                            details,
                        },
                    ));
                }
            } else if max_rise.as_ref().is_none_or(|(best, _)| variation > *best) {
                max_rise = Some((
                    variation,
                    WeatherAlert {
                        code: AlertCode::TempRise,
                        severity: AlertSeverity::Warning,
                        description: format!(
                            "🌡️ Aumento de temperatura (+{variation:.0}°C em {days_between} {day_word})"
                        ),
                        timestamp: alert_time,
                        details,
                    },
                ));
            }
        }
    }

    max_drop
        .into_iter()
        .chain(max_rise)
        .map(|(_, alert)| alert)
        .collect()
}
