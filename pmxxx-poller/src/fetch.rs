//! Retrieval of a meter's status page.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::trace;

use crate::error::{PollerError, Result};

/// Path of the status page on every PM-xxx device.
pub const STATUS_PATH: &str = "/scd.xml";

/// Fetches the raw status page for a meter.
///
/// Implementations must bound each call by `timeout` and report any
/// non-200 answer as [`PollerError::BadStatus`].
pub trait MeterFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        identity: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Plain-HTTP fetcher for `http://{identity}/scd.xml`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with its own connection pool.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pmxxx-poller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PollerError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// URL polled for a meter.
    pub fn status_url(identity: &str) -> String {
        format!("http://{}{}", identity, STATUS_PATH)
    }
}

impl MeterFetcher for HttpFetcher {
    async fn fetch(&self, identity: &str, timeout: Duration) -> Result<String> {
        let url = Self::status_url(identity);
        trace!(%url, ?timeout, "Fetching meter status page");

        let response = self.client.get(&url).timeout(timeout).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PollerError::BadStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url() {
        assert_eq!(
            HttpFetcher::status_url("192.168.1.40"),
            "http://192.168.1.40/scd.xml"
        );
        assert_eq!(
            HttpFetcher::status_url("127.0.0.1:5500/example%20files"),
            "http://127.0.0.1:5500/example%20files/scd.xml"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_failure() {
        let fetcher = HttpFetcher::new().unwrap();

        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher
            .fetch(&addr.to_string(), Duration::from_millis(500))
            .await
            .unwrap_err();

        assert!(matches!(err, PollerError::Network(_)));
        assert!(err.is_unreachable());
    }
}
