//! Configuration for the polling engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::{DEFAULT_CACHE_TTL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{PollerError, Result};

/// Polling engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Meter identities (host, host:port, or host/path-prefix) to register at startup.
    #[serde(default)]
    pub meters: Vec<String>,

    /// Minimum seconds between cycles that hit the network (default: 1).
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: f64,

    /// Per-request timeout in seconds (default: 2).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,
}

fn default_cache_ttl() -> f64 {
    DEFAULT_CACHE_TTL.as_secs_f64()
}

fn default_request_timeout() -> f64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs_f64()
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            meters: Vec::new(),
            cache_ttl_secs: default_cache_ttl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PollerConfig {
    /// Create a config for the given meters with default timings.
    pub fn with_meters<I, S>(meters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            meters: meters.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.cache_ttl_secs)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.meters.is_empty() {
            return Err(PollerError::config(
                "At least one meter must be configured",
            ));
        }

        for (i, meter) in self.meters.iter().enumerate() {
            if meter.trim().is_empty() {
                return Err(PollerError::config(format!(
                    "Meter #{} has an empty identity",
                    i + 1
                )));
            }
            if meter.contains("://") {
                return Err(PollerError::config(format!(
                    "Meter '{}': give the host only, without a URL scheme",
                    meter
                )));
            }
        }

        validate_seconds("cache_ttl_secs", self.cache_ttl_secs)?;
        validate_seconds("request_timeout_secs", self.request_timeout_secs)?;

        Ok(())
    }
}

/// Check that a seconds value is positive and representable as a [`Duration`].
pub fn validate_seconds(name: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
        return Err(PollerError::config(format!(
            "{} must be a positive number of seconds (got {})",
            name, secs
        )));
    }
    Ok(())
}
