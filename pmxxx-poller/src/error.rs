//! Error types for the polling engine.

use thiserror::Error;

/// Result type alias using [`PollerError`].
pub type Result<T> = std::result::Result<T, PollerError>;

/// Errors raised while polling a meter or configuring the engine.
///
/// Every variant except [`PollerError::Config`] is scoped to a single meter
/// and is turned into a down transition by the poll cycle.
#[derive(Debug, Error)]
pub enum PollerError {
    /// Connection refused, DNS failure, timeout or body read failure.
    #[error("Network failure: {0}")]
    Network(String),

    /// The device answered with something other than 200 OK.
    #[error("Unexpected HTTP status {status}")]
    BadStatus { status: u16 },

    /// The status page did not contain a full set of numeric readings.
    #[error("Malformed telemetry: {0}")]
    MalformedTelemetry(String),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PollerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed telemetry error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedTelemetry(msg.into())
    }

    /// Whether the error describes a meter being unreachable (as opposed to
    /// reachable but returning unusable data).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::BadStatus { .. })
    }
}

impl From<reqwest::Error> for PollerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<pmxxx_common::Error> for PollerError {
    fn from(err: pmxxx_common::Error) -> Self {
        Self::Config(err.to_string())
    }
}
