use std::sync::Arc;

use serde_json::{Value, json};
use tempo_regional::data::cache::CacheStore;
use tempo_regional::data::openmeteo::{OpenMeteoProvider, hourly_cache_key};
use tempo_regional::data::{Prefetched, staged_writes};
use wiremock::matchers::{method, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hourly_payload() -> Value {
    json!({
        "hourly": {
            "time": ["2026-03-10T10:00", "2026-03-10T11:00"],
            "temperature_2m": [24.0, 25.0],
            "apparent_temperature": [25.0, 26.0],
            "precipitation": [0.0, 4.0],
            "precipitation_probability": [5.0, 80.0],
            "relative_humidity_2m": [60.0, 70.0],
            "wind_speed_10m": [10.0, 20.0],
            "wind_direction_10m": [90.0, 180.0],
            "cloud_cover": [10.0, 70.0],
            "pressure_msl": [1013.0, 1012.0],
            "visibility": [10000.0, 9000.0],
            "uv_index": [4.0, 2.0],
            "is_day": [1, 1],
            "weather_code": [1, 61]
        }
    })
}

fn daily_payload() -> Value {
    json!({
        "daily": {
            "time": ["2026-03-10", "2026-03-11"],
            "temperature_2m_max": [30.0, 28.0],
            "temperature_2m_min": [19.0, 18.0],
            "apparent_temperature_max": [31.0, 29.0],
            "apparent_temperature_min": [18.0, 17.0],
            "precipitation_sum": [12.0, 0.0],
            "precipitation_probability_mean": [80.0, 10.0],
            "wind_speed_10m_max": [22.0, 18.0],
            "wind_direction_10m_dominant": [135.0, 90.0],
            "uv_index_max": [9.0, 8.0],
            "sunrise": ["2026-03-10T06:05", "2026-03-11T06:06"],
            "sunset": ["2026-03-10T18:30", "2026-03-11T18:29"],
            "precipitation_hours": [4.0, 0.0]
        }
    })
}

fn temp_cache() -> (tempfile::TempDir, Arc<CacheStore>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let cache = Arc::new(CacheStore::open(&dir.path().join("cache.sqlite"), true));
    (dir, cache)
}

#[tokio::test]
async fn hourly_fetch_maps_payload_and_caches_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = OpenMeteoProvider::with_base_url(cache, server.uri());

    let first = provider
        .get_hourly_forecast(-22.75, -49.94, "3543204", 168, None, None)
        .await
        .expect("first fetch");
    assert_eq!(first.len(), 2);
    assert_eq!(first[1].provider_code, 61);
    assert!(!first[1].description.is_empty());

    // Second call is served from the cache; the mock expects one request
    let second = provider
        .get_hourly_forecast(-22.75, -49.94, "3543204", 168, None, None)
        .await
        .expect("cached fetch");
    assert_eq!(second.len(), 2);
    assert_eq!(second[1].timestamp, first[1].timestamp);
}

#[tokio::test]
async fn daily_fetch_maps_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_payload()))
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = OpenMeteoProvider::with_base_url(cache, server.uri());

    let days = provider
        .get_daily_forecast(-22.75, -49.94, "3543204", 16, None, None)
        .await
        .expect("daily fetch");
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].sunrise, "06:05");
    assert!(days[0].weather_code > 0);
}

#[tokio::test]
async fn staged_writes_defer_the_cache_commit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = OpenMeteoProvider::with_base_url(Arc::clone(&cache), server.uri());
    let writes = staged_writes();

    provider
        .get_hourly_forecast(-22.75, -49.94, "3543204", 168, None, Some(&writes))
        .await
        .expect("fetch with staging");

    let key = hourly_cache_key("3543204");
    assert!(
        writes.lock().expect("staging map").contains_key(&key),
        "payload staged for the batch write"
    );
    // Nothing was committed to the store itself
    assert!(cache.get(&key).await.is_none());
}

#[tokio::test]
async fn prefetched_map_skips_cache_and_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, cache) = temp_cache();
    let provider = OpenMeteoProvider::with_base_url(cache, server.uri());

    let mut prefetched = Prefetched::new();
    prefetched.insert(hourly_cache_key("3543204"), hourly_payload());

    let forecasts = provider
        .get_hourly_forecast(-22.75, -49.94, "3543204", 168, Some(&prefetched), None)
        .await
        .expect("prefetched fetch");
    assert_eq!(forecasts.len(), 2);
}

#[tokio::test]
async fn rate_limited_fetch_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .mount(&server)
        .await;

    let provider =
        OpenMeteoProvider::with_base_url(Arc::new(CacheStore::disabled()), server.uri());

    let forecasts = provider
        .get_hourly_forecast(-22.75, -49.94, "3543204", 168, None, None)
        .await
        .expect("retried fetch");
    assert_eq!(forecasts.len(), 2);
    assert_eq!(server.received_requests().await.expect("requests").len(), 2);
}

#[tokio::test]
async fn hourly_query_requests_sao_paulo_timezone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param_contains("timezone", "America"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        OpenMeteoProvider::with_base_url(Arc::new(CacheStore::disabled()), server.uri());
    provider
        .get_hourly_forecast(-22.75, -49.94, "3543204", 168, None, None)
        .await
        .expect("fetch");
}
