//! The management facade over the polling core.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::PollingCache;
use crate::callbacks::MeterCallbacks;
use crate::config::{PollerConfig, validate_seconds};
use crate::cycle::{CycleOutcome, PollCycleRunner};
use crate::error::Result;
use crate::fetch::{HttpFetcher, MeterFetcher};
use crate::meter::{Meter, MeterSnapshot};
use crate::registry::MeterRegistry;
use crate::scheduler::{self, SchedulerHandle};

/// Owns the registry, cache and cycle runner for a set of meters, and the
/// background scheduler when one is running.
///
/// The callbacks are fixed at construction and receive every update, down
/// and removal notification for the engine's lifetime.
pub struct PollingEngine<F: MeterFetcher = HttpFetcher> {
    registry: Arc<MeterRegistry>,
    cache: Arc<PollingCache>,
    runner: Arc<PollCycleRunner<F>>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl<F: MeterFetcher> PollingEngine<F> {
    /// Create an engine with default timings and no meters.
    pub fn new(fetcher: F, callbacks: Arc<dyn MeterCallbacks>) -> Self {
        Self::with_cache(PollingCache::default(), fetcher, callbacks)
    }

    /// Create an engine from configuration, registering every configured meter.
    pub fn from_config(
        config: &PollerConfig,
        fetcher: F,
        callbacks: Arc<dyn MeterCallbacks>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = PollingCache::new(config.cache_ttl(), config.request_timeout());
        let engine = Self::with_cache(cache, fetcher, callbacks);
        for identity in &config.meters {
            engine.register(identity.trim());
        }

        info!(
            meters = engine.registry.len(),
            ttl_secs = config.cache_ttl_secs,
            timeout_secs = config.request_timeout_secs,
            "Polling engine configured"
        );
        Ok(engine)
    }

    fn with_cache(cache: PollingCache, fetcher: F, callbacks: Arc<dyn MeterCallbacks>) -> Self {
        let registry = Arc::new(MeterRegistry::new());
        let cache = Arc::new(cache);
        let runner = Arc::new(PollCycleRunner::new(
            registry.clone(),
            cache.clone(),
            fetcher,
            callbacks,
        ));

        Self {
            registry,
            cache,
            runner,
            scheduler: Mutex::new(None),
        }
    }

    /// The shared registry, for exposition layers that read meter state.
    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<PollingCache> {
        &self.cache
    }

    /// Register a meter, or return the existing one with this identity.
    pub fn register(&self, identity: &str) -> Arc<Meter> {
        self.registry.register(identity)
    }

    /// Remove a meter, notifying `on_removed` before it leaves the registry.
    ///
    /// If a cycle is polling the meter at that moment, its result is
    /// discarded: `on_removed` is always the meter's last notification.
    /// Returns false if no meter has this identity.
    pub fn unregister(&self, identity: &str) -> bool {
        let Some(meter) = self.registry.find(identity) else {
            debug!(meter = %identity, "Unregister requested for unknown meter");
            return false;
        };

        self.runner.remove_meter(&meter)
    }

    /// Change a meter's identity in place.
    ///
    /// Future fetches and lookups use the new identity. No check is made
    /// that the new identity is unused; unregister and register instead when
    /// uniqueness matters. Returns false if no meter has `identity`.
    pub fn rename(&self, identity: &str, new_identity: &str) -> bool {
        match self.registry.find(identity) {
            Some(meter) => {
                meter.set_identity(new_identity);
                true
            }
            None => false,
        }
    }

    /// Find a meter by identity.
    pub fn find(&self, identity: &str) -> Option<Arc<Meter>> {
        self.registry.find(identity)
    }

    /// All meters, in registration order.
    pub fn list(&self) -> Vec<Arc<Meter>> {
        self.registry.list()
    }

    /// Snapshots of all meters, in registration order.
    pub fn snapshots(&self) -> Vec<MeterSnapshot> {
        self.registry.snapshots()
    }

    /// Change the cache TTL. Takes effect from the next gate check.
    pub fn set_ttl(&self, ttl: Duration) -> Result<()> {
        validate_seconds("cache TTL", ttl.as_secs_f64())?;
        self.cache.set_ttl(ttl);
        Ok(())
    }

    /// Change the per-request timeout. Takes effect from the next fetch.
    pub fn set_request_timeout(&self, timeout: Duration) -> Result<()> {
        validate_seconds("request timeout", timeout.as_secs_f64())?;
        self.cache.set_request_timeout(timeout);
        Ok(())
    }

    /// Poll now, unless the cache is still fresh, and return meter state.
    pub async fn poll(&self) -> Vec<MeterSnapshot> {
        self.run_cycle_at(Instant::now()).await;
        self.snapshots()
    }

    /// Run the cycle gate as of `now`.
    pub async fn run_cycle_at(&self, now: Instant) -> CycleOutcome {
        self.runner.run_cycle(now).await
    }

    /// Start the background scheduler. Returns false if it is already running.
    pub fn start_scheduler(&self) -> bool {
        let mut scheduler = self.scheduler.lock();
        if let Some(handle) = scheduler.as_ref()
            && !handle.is_finished()
        {
            debug!("Scheduler already running");
            return false;
        }

        *scheduler = Some(scheduler::spawn(self.runner.clone()));
        true
    }

    /// Stop the background scheduler, letting an in-flight cycle finish.
    pub async fn stop_scheduler(&self) {
        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
            info!("Scheduler stopped");
        }
    }

    /// Whether the background scheduler is running.
    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
