// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Minimal GET interface used by the catalog download and the prober.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and return the body as text. Non-2xx is an error.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// GET `url` and return the raw body. Non-2xx is an error.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs));
    if config.accept_invalid_certs {
        log::warn!("TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }
    Ok(builder.build()?)
}

/// [`Fetch`] backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the client from configuration.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Backoff before attempt `attempt` (1-based retry count), doubling each time.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(10);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// GET bytes, retrying up to `retries` extra times with exponential backoff.
///
/// The final failure is returned as-is; callers decide how fatal it is.
pub async fn get_bytes_with_retry(
    fetcher: &dyn Fetch,
    url: &str,
    retries: u32,
    backoff_ms: u64,
) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        match fetcher.get_bytes(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if attempt < retries => {
                attempt += 1;
                let delay = backoff_delay(backoff_ms, attempt);
                log::warn!(
                    "GET {} failed ({}); retry {}/{} in {:?}",
                    url,
                    e,
                    attempt,
                    retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticFetcher;
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(2000));
    }

    #[test]
    fn test_create_client_from_default_config() {
        assert!(create_async_client(&HttpConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let fetcher = StaticFetcher::new()
            .with_page("https://x/catalog.xlsx", b"data".to_vec())
            .failing_first("https://x/catalog.xlsx", 2);

        let bytes = get_bytes_with_retry(&fetcher, "https://x/catalog.xlsx", 2, 1)
            .await
            .unwrap();
        assert_eq!(bytes, b"data");
        assert_eq!(fetcher.request_count("https://x/catalog.xlsx"), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let fetcher = StaticFetcher::new()
            .with_page("https://x/catalog.xlsx", b"data".to_vec())
            .failing_first("https://x/catalog.xlsx", 5);

        let result = get_bytes_with_retry(&fetcher, "https://x/catalog.xlsx", 1, 1).await;
        assert!(result.is_err());
        assert_eq!(fetcher.request_count("https://x/catalog.xlsx"), 2);
    }
}
