#![allow(clippy::missing_errors_doc)]

use chrono::{NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};

use crate::domain::errors::WeatherError;
use crate::domain::forecast::SAO_PAULO;
use crate::usecase::neighbor_cities::DEFAULT_RADIUS_KM;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "tempo-regional",
    version,
    about = "Regional weather aggregation for Brazilian municipalities"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Current conditions and alerts for one city
    City {
        city_id: String,
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Target time (HH:MM), requires --date
        #[arg(long, requires = "date")]
        time: Option<String>,
    },
    /// Consolidated weather for a list of cities
    Regional {
        #[arg(required = true)]
        city_ids: Vec<String>,
    },
    /// Extended forecast (current + 16 days + 168 hours)
    Detailed { city_id: String },
    /// Cities within a radius of a center city
    Neighbors {
        city_id: String,
        /// Radius in km (10-150)
        #[arg(long, default_value_t = DEFAULT_RADIUS_KM)]
        radius: f64,
    },
}

/// Combine optional `YYYY-MM-DD` / `HH:MM` inputs into a
/// timezone-aware target, midnight when the time is omitted.
pub fn parse_target_datetime(
    date: Option<&str>,
    time: Option<&str>,
) -> Result<Option<chrono::DateTime<Tz>>, WeatherError> {
    let Some(date) = date else {
        return Ok(None);
    };
    let invalid = || WeatherError::InvalidDateTime {
        value: format!("{date} {}", time.unwrap_or("")),
    };

    let parsed_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
    let parsed_time = match time {
        Some(time) => NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| invalid())?,
        None => NaiveTime::MIN,
    };

    SAO_PAULO
        .from_local_datetime(&parsed_date.and_time(parsed_time))
        .single()
        .map(Some)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_city_command_with_target() {
        let cli = Cli::parse_from([
            "tempo-regional",
            "city",
            "3543204",
            "--date",
            "2026-03-10",
            "--time",
            "14:00",
        ]);
        match cli.command {
            Command::City { city_id, date, time } => {
                assert_eq!(city_id, "3543204");
                let target = parse_target_datetime(date.as_deref(), time.as_deref())
                    .expect("valid target")
                    .expect("present");
                assert_eq!(target.format("%H:%M").to_string(), "14:00");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn time_without_date_is_rejected() {
        assert!(
            Cli::try_parse_from(["tempo-regional", "city", "1", "--time", "14:00"]).is_err()
        );
    }

    #[test]
    fn regional_requires_at_least_one_city() {
        assert!(Cli::try_parse_from(["tempo-regional", "regional"]).is_err());
    }

    #[test]
    fn invalid_datetime_is_a_typed_error() {
        let err = parse_target_datetime(Some("10/03/2026"), None).expect_err("bad date");
        assert!(matches!(err, WeatherError::InvalidDateTime { .. }));
        let err =
            parse_target_datetime(Some("2026-03-10"), Some("25:00")).expect_err("bad time");
        assert!(matches!(err, WeatherError::InvalidDateTime { .. }));
    }

    #[test]
    fn missing_date_means_no_target() {
        assert!(
            parse_target_datetime(None, None)
                .expect("no target is fine")
                .is_none()
        );
    }
}
