//! Configuration for the Prometheus exporter.

use pmxxx_common::{LoggingConfig, load_config, parse_config, split_list};
use pmxxx_poller::PollerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable listing meter identities, comma separated.
pub const ENV_METERS: &str = "METERS";
/// Environment variable overriding the cache TTL in seconds.
pub const ENV_CACHE_TTL: &str = "CACHE_TTL";
/// Environment variable overriding the request timeout in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";

/// Extra shutdown allowance on top of one worst-case poll cycle.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

/// Routes served besides the metrics endpoint.
const RESERVED_PATHS: [&str; 4] = ["/", "/health", "/ready", "/api/meters"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Load(#[from] pmxxx_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Meters and polling timings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9584").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric name prefix (default: "pmxxx"). Empty for bare field names.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:9584".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "pmxxx".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            prefix: default_prefix(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    ///
    /// The result is not validated: environment overrides may still supply
    /// required settings. Call [`validate`](Self::validate) once they are applied.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Ok(load_config(path)?)
    }

    /// Parse configuration from a JSON5 string, without validating.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(parse_config(content)?)
    }

    /// Apply `METERS`, `CACHE_TTL` and `REQUEST_TIMEOUT` from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to read variables.
    ///
    /// A non-empty `METERS` replaces the configured meter list.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(meters) = lookup(ENV_METERS) {
            let meters = split_list(&meters);
            if !meters.is_empty() {
                self.poller.meters = meters;
            }
        }

        if let Some(ttl) = lookup(ENV_CACHE_TTL) {
            self.poller.cache_ttl_secs = parse_seconds(ENV_CACHE_TTL, &ttl)?;
        }

        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
            self.poller.request_timeout_secs = parse_seconds(ENV_REQUEST_TIMEOUT, &timeout)?;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poller
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if RESERVED_PATHS.contains(&self.prometheus.path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} is reserved",
                self.prometheus.path
            )));
        }

        if !is_valid_prefix(&self.prometheus.prefix) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric prefix: {}",
                self.prometheus.prefix
            )));
        }

        Ok(())
    }

    /// How long shutdown waits for the scheduler and HTTP server.
    ///
    /// An in-flight cycle can take one request timeout per meter. Saturates
    /// at [`Duration::MAX`].
    pub fn shutdown_grace(&self) -> Duration {
        let meters = u32::try_from(self.poller.meters.len()).unwrap_or(u32::MAX);
        self.poller
            .request_timeout()
            .saturating_mul(meters)
            .saturating_add(SHUTDOWN_SLACK)
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| {
        ConfigError::Validation(format!("{} must be a number of seconds, got '{}'", name, value))
    })
}

/// Prometheus metric names: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        Some(_) => false,
    }
}
