//! The meter entity.

use parking_lot::RwLock;
use pmxxx_common::FieldValues;
use serde::Serialize;
use tracing::info;

/// One remote PM-xxx device and its last-known telemetry.
///
/// All mutable state sits behind a single lock, so readers always observe
/// a consistent snapshot: a new set of values is swapped in whole together
/// with the up flag, never written field by field.
#[derive(Debug)]
pub struct Meter {
    state: RwLock<MeterState>,
}

#[derive(Debug)]
struct MeterState {
    identity: String,
    is_up: bool,
    values: FieldValues,
    last_success_ms: Option<i64>,
    consecutive_failures: u32,
}

/// Read-only copy of a meter's state, handed to callbacks and readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterSnapshot {
    /// Hostname (optionally with port and path prefix) of the device.
    pub identity: String,
    /// Whether the last poll succeeded.
    pub is_up: bool,
    /// Last successfully parsed values.
    pub values: FieldValues,
    /// When the last successful poll completed (millis since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_ms: Option<i64>,
    /// Failed polls since the last success.
    pub consecutive_failures: u32,
}

impl Meter {
    /// Create a meter with no readings. The meter starts down.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(MeterState {
                identity: identity.into(),
                is_up: false,
                values: FieldValues::new(),
                last_success_ms: None,
                consecutive_failures: 0,
            }),
        }
    }

    /// Current identity.
    pub fn identity(&self) -> String {
        self.state.read().identity.clone()
    }

    /// Whether the meter answered the last poll with usable telemetry.
    pub fn is_up(&self) -> bool {
        self.state.read().is_up
    }

    /// Copy of the current values.
    pub fn values(&self) -> FieldValues {
        self.state.read().values
    }

    /// Take a consistent snapshot of the whole meter.
    pub fn snapshot(&self) -> MeterSnapshot {
        let state = self.state.read();
        MeterSnapshot {
            identity: state.identity.clone(),
            is_up: state.is_up,
            values: state.values,
            last_success_ms: state.last_success_ms,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Change the identity in place.
    ///
    /// No collision check is made against other meters in the registry.
    pub fn set_identity(&self, identity: impl Into<String>) {
        let identity = identity.into();
        let mut state = self.state.write();
        info!(meter = %state.identity, new_identity = %identity, "Renaming meter");
        state.identity = identity;
    }

    pub(crate) fn identity_is(&self, identity: &str) -> bool {
        self.state.read().identity == identity
    }

    /// Replace the values with a freshly parsed set and mark the meter up.
    pub(crate) fn record_success(&self, values: FieldValues) -> MeterSnapshot {
        let mut state = self.state.write();
        state.values = values;
        state.is_up = true;
        state.last_success_ms = Some(chrono::Utc::now().timestamp_millis());
        state.consecutive_failures = 0;
        drop(state);
        self.snapshot()
    }

    /// Mark the meter down. Values are left as they were.
    pub(crate) fn record_failure(&self) -> MeterSnapshot {
        let mut state = self.state.write();
        state.is_up = false;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        drop(state);
        self.snapshot()
    }
}
