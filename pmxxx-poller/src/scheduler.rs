//! Background task that keeps the cache warm.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cycle::{CycleOutcome, PollCycleRunner};
use crate::fetch::MeterFetcher;

/// Handle to a running scheduler task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Whether the scheduler task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the scheduler to stop and wait for it to exit.
    ///
    /// An in-flight cycle is allowed to finish first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Scheduler task panicked");
            }
        }
    }
}

/// Spawn the polling loop on the current tokio runtime.
pub fn spawn<F: MeterFetcher>(runner: Arc<PollCycleRunner<F>>) -> SchedulerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(runner, shutdown_rx));
    SchedulerHandle {
        shutdown: shutdown_tx,
        task,
    }
}

/// Run cycles until `shutdown` turns true.
///
/// After each cycle the loop sleeps until the cache expires; if a cycle
/// overran the TTL it goes straight into the next one.
pub async fn run<F: MeterFetcher>(
    runner: Arc<PollCycleRunner<F>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        ttl_secs = runner.cache().ttl().as_secs_f64(),
        meters = runner.registry().len(),
        "Scheduler started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        if let CycleOutcome::Refreshed(report) = runner.run_cycle(Instant::now()).await {
            debug!(
                updated = report.updated,
                down = report.down,
                "Scheduled cycle finished"
            );
        }

        let sleep_for = runner.cache().time_until_refresh(Instant::now());
        debug!(sleep_ms = sleep_for.as_millis() as u64, "Scheduler sleeping");

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Scheduler stopped");
}
