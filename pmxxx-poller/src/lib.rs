//! Polling and caching engine for PM-xxx power meters.
//!
//! Each meter serves its measurements at `http://<identity>/scd.xml` as a
//! flat run of numbers in a fixed field order. The engine keeps a registry
//! of meters, refreshes all of them in one sequential cycle at most once per
//! cache TTL, and reports every outcome through [`MeterCallbacks`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pmxxx_poller::{HttpFetcher, NoopCallbacks, PollerConfig, PollingEngine};
//!
//! # async fn run() -> pmxxx_poller::Result<()> {
//! let config = PollerConfig::with_meters(["10.0.0.5"]);
//! let engine = PollingEngine::from_config(&config, HttpFetcher::new()?, Arc::new(NoopCallbacks))?;
//!
//! for meter in engine.poll().await {
//!     println!("{} up={}", meter.identity, meter.is_up);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod callbacks;
pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod meter;
pub mod mock;
pub mod parser;
pub mod registry;
pub mod scheduler;

pub use cache::{DEFAULT_CACHE_TTL, DEFAULT_REQUEST_TIMEOUT, PollingCache};
pub use callbacks::{MeterCallbacks, NoopCallbacks};
pub use config::PollerConfig;
pub use cycle::{CycleOutcome, CycleReport, PollCycleRunner};
pub use engine::PollingEngine;
pub use error::{PollerError, Result};
pub use fetch::{HttpFetcher, MeterFetcher, STATUS_PATH};
pub use meter::{Meter, MeterSnapshot};
pub use parser::parse_telemetry;
pub use registry::{MeterRegistry, Registration};
pub use scheduler::SchedulerHandle;
