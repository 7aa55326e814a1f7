//! Notifications from the engine to the exposition layer.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::meter::MeterSnapshot;

/// Hooks through which an exposition layer observes meter state changes.
///
/// Hooks run synchronously on the polling task, so a slow hook delays the
/// rest of the cycle. A panicking hook is logged and does not stop polling.
pub trait MeterCallbacks: Send + Sync {
    /// Fresh telemetry was parsed for the meter in this cycle.
    fn on_update(&self, meter: &MeterSnapshot);

    /// The meter could not be fetched or its page could not be parsed.
    fn on_down(&self, meter: &MeterSnapshot);

    /// The meter is about to be unregistered.
    fn on_removed(&self, meter: &MeterSnapshot);
}

/// Callbacks that ignore every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl MeterCallbacks for NoopCallbacks {
    fn on_update(&self, _meter: &MeterSnapshot) {}
    fn on_down(&self, _meter: &MeterSnapshot) {}
    fn on_removed(&self, _meter: &MeterSnapshot) {}
}

/// Which hook to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    Update,
    Down,
    Removed,
}

impl Hook {
    fn as_str(&self) -> &'static str {
        match self {
            Hook::Update => "on_update",
            Hook::Down => "on_down",
            Hook::Removed => "on_removed",
        }
    }
}

/// Invoke a hook, containing any panic it raises.
///
/// Returns false if the hook panicked.
pub(crate) fn dispatch(callbacks: &dyn MeterCallbacks, hook: Hook, meter: &MeterSnapshot) -> bool {
    let result = catch_unwind(AssertUnwindSafe(|| match hook {
        Hook::Update => callbacks.on_update(meter),
        Hook::Down => callbacks.on_down(meter),
        Hook::Removed => callbacks.on_removed(meter),
    }));

    if result.is_err() {
        error!(meter = %meter.identity, hook = hook.as_str(), "Meter callback panicked");
        return false;
    }
    true
}
