//! One sequential pass over every registered meter.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use pmxxx_common::FieldValues;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::cache::PollingCache;
use crate::callbacks::{Hook, MeterCallbacks, dispatch};
use crate::error::Result;
use crate::fetch::MeterFetcher;
use crate::meter::Meter;
use crate::parser::parse_telemetry;
use crate::registry::MeterRegistry;

/// What a call to [`PollCycleRunner::run_cycle`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The TTL had not elapsed; nothing was fetched.
    Cached,
    /// Every registered meter was polled.
    Refreshed(CycleReport),
}

impl CycleOutcome {
    /// Whether this call performed network work.
    pub fn is_refreshed(&self) -> bool {
        matches!(self, CycleOutcome::Refreshed(_))
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// When the cycle began; becomes the new cache timestamp.
    pub started: Instant,
    /// Meters that produced fresh telemetry.
    pub updated: usize,
    /// Meters that were unreachable or returned unusable data.
    pub down: usize,
    /// Callback invocations that panicked.
    pub callback_failures: usize,
    /// Wall-clock time spent in the cycle.
    pub duration: Duration,
}

/// Runs poll cycles against a registry, gated by a [`PollingCache`].
///
/// Cycles never overlap: a caller arriving while a cycle is in flight waits
/// for it and then re-checks the gate. Callbacks must not unregister meters
/// themselves; delivery and removal share a lock.
pub struct PollCycleRunner<F> {
    registry: Arc<MeterRegistry>,
    cache: Arc<PollingCache>,
    fetcher: F,
    callbacks: Arc<dyn MeterCallbacks>,
    in_flight: Mutex<()>,
    notify: SyncMutex<()>,
}

impl<F: MeterFetcher> PollCycleRunner<F> {
    pub fn new(
        registry: Arc<MeterRegistry>,
        cache: Arc<PollingCache>,
        fetcher: F,
        callbacks: Arc<dyn MeterCallbacks>,
    ) -> Self {
        Self {
            registry,
            cache,
            fetcher,
            callbacks,
            in_flight: Mutex::new(()),
            notify: SyncMutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<PollingCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.registry
    }

    pub fn callbacks(&self) -> &Arc<dyn MeterCallbacks> {
        &self.callbacks
    }

    /// Run a cycle if the cache has expired at `now`.
    pub async fn run_cycle(&self, now: Instant) -> CycleOutcome {
        if self.cache.is_fresh(now) {
            trace!("Returning cached meter state");
            return CycleOutcome::Cached;
        }

        let _guard = self.in_flight.lock().await;
        if self.cache.is_fresh(now) {
            trace!("Cycle completed while waiting, returning cached meter state");
            return CycleOutcome::Cached;
        }

        let mut report = CycleReport {
            started: now,
            updated: 0,
            down: 0,
            callback_failures: 0,
            duration: Duration::ZERO,
        };

        for meter in self.registry.list() {
            let result = self.fetch_meter(&meter).await;

            // Held from the registration check through dispatch so that an
            // unregister cannot slip between them.
            let _notify = self.notify.lock();
            if !self.registry.contains(&meter) {
                debug!(
                    meter = %meter.identity(),
                    "Meter unregistered during cycle, result discarded"
                );
                continue;
            }

            let (hook, snapshot) = match result {
                Ok(values) => {
                    report.updated += 1;
                    (Hook::Update, meter.record_success(values))
                }
                Err(e) => {
                    warn!(meter = %meter.identity(), error = %e, "Meter poll failed");
                    report.down += 1;
                    (Hook::Down, meter.record_failure())
                }
            };

            if !dispatch(self.callbacks.as_ref(), hook, &snapshot) {
                report.callback_failures += 1;
            }
        }

        self.cache.mark_refreshed(now);
        report.duration = Instant::now().saturating_duration_since(now);

        debug!(
            updated = report.updated,
            down = report.down,
            duration_ms = report.duration.as_millis() as u64,
            "Poll cycle complete"
        );

        CycleOutcome::Refreshed(report)
    }

    /// Notify `on_removed` and delete the meter from the registry.
    ///
    /// Serialized with result delivery in [`run_cycle`](Self::run_cycle): once
    /// this returns, no further notification is made for the meter. Returns
    /// false if the meter was already gone.
    pub fn remove_meter(&self, meter: &Arc<Meter>) -> bool {
        let _notify = self.notify.lock();
        if !self.registry.contains(meter) {
            return false;
        }

        dispatch(self.callbacks.as_ref(), Hook::Removed, &meter.snapshot());
        self.registry.remove_meter(meter)
    }

    /// Fetch and parse one meter's status page.
    async fn fetch_meter(&self, meter: &Meter) -> Result<FieldValues> {
        let identity = meter.identity();
        let timeout = self.cache.request_timeout();

        let body = self.fetcher.fetch(&identity, timeout).await?;
        let values = parse_telemetry(&body)?;

        trace!(meter = %identity, ?values, "Parsed telemetry");
        Ok(values)
    }
}
