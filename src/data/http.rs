//! Shared outbound HTTP session and the upstream retry policy.

use std::sync::OnceLock;
use std::time::Duration;

use log::warn;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::domain::errors::WeatherError;
use crate::resilience::backoff::Backoff;

pub const TIMEOUT_TOTAL: Duration = Duration::from_secs(15);
pub const TIMEOUT_CONNECT: Duration = Duration::from_secs(5);
pub const TIMEOUT_READ: Duration = Duration::from_secs(10);
pub const POOL_MAX_IDLE_PER_HOST: usize = 30;

pub const RETRY_MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF_BASE_SECS: u64 = 1;
pub const RETRY_BACKOFF_MAX_SECS: u64 = 4;

/// Process-wide outbound client, built once and shared by every provider.
pub fn shared_client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(TIMEOUT_TOTAL)
            .connect_timeout(TIMEOUT_CONNECT)
            .read_timeout(TIMEOUT_READ)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

const fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// GET a JSON document with the upstream retry policy: only 429 and 503
/// are retried, with exponential backoff between attempts. Any other
/// non-success status fails immediately.
pub async fn fetch_json_with_retry(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, WeatherError> {
    let mut backoff = Backoff::new(RETRY_BACKOFF_BASE_SECS, RETRY_BACKOFF_MAX_SECS);

    for attempt in 1..=RETRY_MAX_ATTEMPTS {
        let response = client.get(url).query(query).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<Value>().await?);
        }

        if is_retryable(status) && attempt < RETRY_MAX_ATTEMPTS {
            let delay = backoff.next_delay();
            warn!(
                "upstream {url} returned {status}, retrying in {delay}s (attempt {attempt}/{RETRY_MAX_ATTEMPTS})"
            );
            tokio::time::sleep(Duration::from_secs(delay)).await;
            continue;
        }

        return Err(WeatherError::UpstreamStatus {
            status: status.as_u16(),
        });
    }

    unreachable!("retry loop always returns")
}
