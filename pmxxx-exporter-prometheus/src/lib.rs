//! Prometheus metrics exporter for PM-xxx power meters.
//!
//! This crate wires the [`pmxxx_poller`] engine to a Prometheus scrape
//! endpoint: the [`MeterCollector`] receives the engine's update, down and
//! removal notifications and renders them as gauges on `/metrics`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  PollingEngine  │────>│    Collector    │────>│   HTTP Server   │
//! │   (scd.xml)     │     │    (gauges)     │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file, or with meters from
//! the environment:
//!
//! ```bash
//! pmxxx-exporter-prometheus --config config.json5
//! METERS=10.0.0.5,10.0.0.6 pmxxx-exporter-prometheus
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod http;

pub use collector::{CollectorStats, MeterCollector, SharedCollector};
pub use config::{ConfigError, ExporterConfig};
pub use http::HttpServer;
