use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tempo_regional::data::cache::CacheStore;
use tempo_regional::data::municipalities::CityRepository;
use tempo_regional::data::openmeteo::OpenMeteoProvider;
use tempo_regional::domain::city::{City, Coordinates};
use tempo_regional::domain::forecast::SAO_PAULO;
use tempo_regional::usecase::regional_weather::GetRegionalWeather;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LAT_A: f64 = -22.7572;
const LAT_B: f64 = -22.9797;
const LAT_C: f64 = -22.8886;
const LAT_D: f64 = -23.0103;

fn repository() -> Arc<CityRepository> {
    let make = |id: &str, name: &str, lat: f64| City {
        id: id.to_string(),
        name: name.to_string(),
        state: "SP".to_string(),
        region: "Sudeste".to_string(),
        coordinates: Coordinates::new(lat, -49.9),
    };
    Arc::new(CityRepository::from_cities(vec![
        make("A", "Cidade A", LAT_A),
        make("B", "Cidade B", LAT_B),
        City {
            id: "C".to_string(),
            name: "Cidade C".to_string(),
            state: "SP".to_string(),
            region: "Sudeste".to_string(),
            coordinates: None,
        },
        make("D", "Cidade D", LAT_D),
    ]))
}

/// One payload usable for both hourly and daily requests, with
/// timestamps anchored to the wall clock so current-extraction finds a
/// future hour.
fn combined_payload() -> Value {
    let now = Utc::now().with_timezone(&SAO_PAULO);
    let hours: Vec<String> = (0..48)
        .map(|i| (now + Duration::hours(i)).format("%Y-%m-%dT%H:%M").to_string())
        .collect();
    let n = hours.len();
    let dates: Vec<String> = (0..3)
        .map(|i| (now + Duration::days(i)).date_naive().to_string())
        .collect();

    json!({
        "hourly": {
            "time": hours,
            "temperature_2m": vec![Some(24.0); n],
            "apparent_temperature": vec![Some(25.0); n],
            "precipitation": vec![Some(0.0); n],
            "precipitation_probability": vec![Some(5.0); n],
            "relative_humidity_2m": vec![Some(60.0); n],
            "wind_speed_10m": vec![Some(10.0); n],
            "wind_direction_10m": vec![Some(90.0); n],
            "cloud_cover": vec![Some(10.0); n],
            "pressure_msl": vec![Some(1013.0); n],
            "visibility": vec![Some(10000.0); n],
            "uv_index": vec![Some(4.0); n],
            "is_day": vec![Some(1); n],
            "weather_code": vec![Some(1); n]
        },
        "daily": {
            "time": dates,
            "temperature_2m_max": [30.0, 29.0, 28.0],
            "temperature_2m_min": [19.0, 18.0, 17.0],
            "apparent_temperature_max": [31.0, 30.0, 29.0],
            "apparent_temperature_min": [18.0, 17.0, 16.0],
            "precipitation_sum": [0.0, 0.0, 0.0],
            "precipitation_probability_mean": [5.0, 5.0, 5.0],
            "wind_speed_10m_max": [15.0, 14.0, 13.0],
            "wind_direction_10m_dominant": [90.0, 90.0, 90.0],
            "uv_index_max": [7.0, 7.0, 7.0],
            "sunrise": ["2026-03-10T06:00", "2026-03-11T06:00", "2026-03-12T06:00"],
            "sunset": ["2026-03-10T18:00", "2026-03-11T18:00", "2026-03-12T18:00"],
            "precipitation_hours": [0.0, 0.0, 0.0]
        }
    })
}

fn temp_cache() -> (tempfile::TempDir, Arc<CacheStore>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let cache = Arc::new(CacheStore::open(&dir.path().join("cache.sqlite"), true));
    (dir, cache)
}

#[tokio::test]
async fn regional_drops_failing_cities_and_returns_the_rest() {
    let server = MockServer::start().await;
    // City B's upstream calls blow up
    Mock::given(method("GET"))
        .and(query_param("latitude", LAT_B.to_string()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(combined_payload()))
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = Arc::new(OpenMeteoProvider::with_base_url(
        Arc::clone(&cache),
        server.uri(),
    ));
    let use_case = GetRegionalWeather::new(repository(), provider, cache);

    let ids: Vec<String> = ["A", "B", "C", "D"].iter().map(ToString::to_string).collect();
    let result = use_case.execute(&ids, None).await;

    let mut returned: Vec<&str> = result.iter().map(|w| w.city_id.as_str()).collect();
    returned.sort_unstable();
    assert_eq!(returned, vec!["A", "D"]);

    // Every returned entry is fully populated and internally consistent
    for weather in &result {
        assert!(weather.temp_min <= weather.temperature);
        assert!(weather.temperature <= weather.temp_max);
        assert!(!weather.description.is_empty());
        assert!(weather.daily_aggregates.is_some());
    }
}

#[tokio::test]
async fn second_regional_request_is_served_from_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(combined_payload()))
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = Arc::new(OpenMeteoProvider::with_base_url(
        Arc::clone(&cache),
        server.uri(),
    ));
    let use_case = GetRegionalWeather::new(repository(), provider, Arc::clone(&cache));

    let ids: Vec<String> = ["A", "D"].iter().map(ToString::to_string).collect();

    let first = use_case.execute(&ids, None).await;
    assert_eq!(first.len(), 2);
    let after_first = server.received_requests().await.expect("requests").len();
    // Two datasets per city
    assert_eq!(after_first, 4);

    let second = use_case.execute(&ids, None).await;
    assert_eq!(second.len(), 2);
    let after_second = server.received_requests().await.expect("requests").len();
    assert_eq!(after_second, after_first, "no extra upstream calls");

    // Same cities, same conditions
    for weather in &second {
        let twin = first
            .iter()
            .find(|w| w.city_id == weather.city_id)
            .expect("same city in both runs");
        assert_eq!(weather.temperature, twin.temperature);
        assert_eq!(weather.description, twin.description);
    }
}

#[tokio::test]
async fn duplicate_city_ids_collapse_to_one_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(combined_payload()))
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = Arc::new(OpenMeteoProvider::with_base_url(
        Arc::clone(&cache),
        server.uri(),
    ));
    let use_case = GetRegionalWeather::new(repository(), provider, cache);

    let ids: Vec<String> = ["A", "A", "A"].iter().map(ToString::to_string).collect();
    let result = use_case.execute(&ids, None).await;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].city_id, "A");
}

#[tokio::test]
async fn empty_result_is_a_valid_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = Arc::new(OpenMeteoProvider::with_base_url(
        Arc::clone(&cache),
        server.uri(),
    ));
    let use_case = GetRegionalWeather::new(repository(), provider, cache);

    let ids: Vec<String> = vec!["A".to_string(), "unknown".to_string()];
    let result = use_case.execute(&ids, None).await;
    assert!(result.is_empty());
}
