//! Gauge store fed by engine callbacks, rendered as Prometheus text.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use pmxxx_common::{Field, FieldValues};
use pmxxx_poller::{MeterCallbacks, MeterSnapshot};
use tracing::{debug, trace};

/// Current gauges for one meter.
#[derive(Debug, Clone, Default)]
struct MeterSeries {
    up: bool,
    values: FieldValues,
}

/// Collector statistics.
#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    /// Update notifications received.
    pub updates: u64,
    /// Down notifications received.
    pub downs: u64,
    /// Removal notifications received.
    pub removals: u64,
}

impl CollectorStats {
    /// Whether any meter has reported, up or down.
    pub fn has_reports(&self) -> bool {
        self.updates + self.downs > 0
    }
}

/// Thread-safe gauge collector.
///
/// Implements [`MeterCallbacks`] so the polling engine drives it directly:
/// an update sets `up` to 1 and every parsed field gauge; a down sets `up`
/// to 0 and drops the field gauges; a removal drops every series for the
/// host.
pub struct MeterCollector {
    /// Metric name prefix; empty for bare field names.
    prefix: String,
    /// Series by host, sorted for stable output.
    meters: RwLock<BTreeMap<String, MeterSeries>>,
    stats: RwLock<CollectorStats>,
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<MeterCollector>;

impl MeterCollector {
    /// Create a new collector with the given metric name prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            meters: RwLock::new(BTreeMap::new()),
            stats: RwLock::new(CollectorStats::default()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full metric name for `name`.
    pub fn metric_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.prefix, name)
        }
    }

    /// Number of hosts with at least one series.
    pub fn meter_count(&self) -> usize {
        self.meters.read().len()
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }

    /// Render metrics in Prometheus exposition format.
    pub fn render(&self) -> String {
        let meters = self.meters.read();
        let mut output = Vec::with_capacity(256 + meters.len() * Field::ALL.len() * 48);

        if !meters.is_empty() {
            let name = self.metric_name("up");
            writeln!(
                output,
                "# HELP {} Whether the last poll of the meter succeeded",
                name
            )
            .ok();
            writeln!(output, "# TYPE {} gauge", name).ok();
            for (host, series) in meters.iter() {
                writeln!(
                    output,
                    "{}{} {}",
                    name,
                    host_label(host),
                    if series.up { 1 } else { 0 }
                )
                .ok();
            }
        }

        for field in Field::ALL {
            let mut samples = meters
                .iter()
                .filter_map(|(host, series)| series.values.get(field).map(|v| (host, v)))
                .peekable();

            if samples.peek().is_none() {
                continue;
            }

            let name = self.metric_name(field.as_str());
            writeln!(output, "# HELP {} {}", name, field.description()).ok();
            writeln!(output, "# TYPE {} gauge", name).ok();
            for (host, value) in samples {
                writeln!(output, "{}{} {}", name, host_label(host), format_value(value)).ok();
            }
        }

        // Collector stats as metrics
        let stats = self.stats.read();
        writeln!(output).ok();
        let meters_name = self.metric_name("exporter_meters");
        writeln!(output, "# TYPE {} gauge", meters_name).ok();
        writeln!(output, "{} {}", meters_name, meters.len()).ok();

        for (suffix, count) in [
            ("exporter_updates_total", stats.updates),
            ("exporter_downs_total", stats.downs),
            ("exporter_removals_total", stats.removals),
        ] {
            let name = self.metric_name(suffix);
            writeln!(output, "# TYPE {} counter", name).ok();
            writeln!(output, "{} {}", name, count).ok();
        }

        String::from_utf8(output).unwrap_or_default()
    }
}

impl MeterCallbacks for MeterCollector {
    fn on_update(&self, meter: &MeterSnapshot) {
        self.meters.write().insert(
            meter.identity.clone(),
            MeterSeries {
                up: true,
                values: meter.values,
            },
        );
        self.stats.write().updates += 1;
        trace!(host = %meter.identity, "Meter gauges updated");
    }

    fn on_down(&self, meter: &MeterSnapshot) {
        self.meters.write().insert(
            meter.identity.clone(),
            MeterSeries {
                up: false,
                values: FieldValues::new(),
            },
        );
        self.stats.write().downs += 1;
        trace!(host = %meter.identity, "Meter marked down");
    }

    fn on_removed(&self, meter: &MeterSnapshot) {
        let removed = self.meters.write().remove(&meter.identity).is_some();
        self.stats.write().removals += 1;
        debug!(host = %meter.identity, had_series = removed, "Meter series removed");
    }
}

fn host_label(host: &str) -> String {
    format!("{{host=\"{}\"}}", escape_label_value(host))
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(identity: &str, is_up: bool, values: FieldValues) -> MeterSnapshot {
        MeterSnapshot {
            identity: identity.to_string(),
            is_up,
            values,
            last_success_ms: None,
            consecutive_failures: 0,
        }
    }

    fn sample_values() -> FieldValues {
        let mut values = FieldValues::new();
        values.set(Field::L1Volt, Some(230.5));
        values.set(Field::Frequency, Some(50.0));
        values
    }

    #[test]
    fn test_update_sets_gauges() {
        let collector = MeterCollector::new("pmxxx");
        collector.on_update(&snapshot("10.0.0.5", true, sample_values()));

        let output = collector.render();
        assert!(output.contains("# TYPE pmxxx_up gauge"));
        assert!(output.contains("pmxxx_up{host=\"10.0.0.5\"} 1"));
        assert!(output.contains("# HELP pmxxx_l1_volt Leg 1 Voltage"));
        assert!(output.contains("pmxxx_l1_volt{host=\"10.0.0.5\"} 230.5"));
        assert!(output.contains("pmxxx_frequency{host=\"10.0.0.5\"} 50"));
        // Unset fields are not emitted
        assert!(!output.contains("pmxxx_thd_in"));
    }

    #[test]
    fn test_down_clears_field_gauges() {
        let collector = MeterCollector::new("pmxxx");
        collector.on_update(&snapshot("a", true, sample_values()));
        collector.on_down(&snapshot("a", false, sample_values()));

        let output = collector.render();
        assert!(output.contains("pmxxx_up{host=\"a\"} 0"));
        assert!(!output.contains("pmxxx_l1_volt"));
        assert_eq!(collector.meter_count(), 1);
    }

    #[test]
    fn test_removed_drops_host() {
        let collector = MeterCollector::new("pmxxx");
        collector.on_update(&snapshot("a", true, sample_values()));
        collector.on_update(&snapshot("b", true, sample_values()));
        collector.on_removed(&snapshot("a", true, sample_values()));

        let output = collector.render();
        assert!(!output.contains("host=\"a\""));
        assert!(output.contains("pmxxx_up{host=\"b\"} 1"));
        assert!(output.contains("pmxxx_exporter_removals_total 1"));
    }

    #[test]
    fn test_hosts_sorted() {
        let collector = MeterCollector::new("pmxxx");
        collector.on_update(&snapshot("z-meter", true, sample_values()));
        collector.on_update(&snapshot("a-meter", true, sample_values()));

        let output = collector.render();
        let a = output.find("pmxxx_up{host=\"a-meter\"}").unwrap();
        let z = output.find("pmxxx_up{host=\"z-meter\"}").unwrap();
        assert!(a < z);
    }

    #[test]
    fn test_empty_prefix() {
        let collector = MeterCollector::new("");
        collector.on_update(&snapshot("a", true, sample_values()));

        let output = collector.render();
        assert!(output.starts_with("# HELP up "));
        assert!(output.contains("\nup{host=\"a\"} 1"));
        assert!(output.contains("l1_volt{host=\"a\"} 230.5"));
        assert!(output.contains("exporter_updates_total 1"));
    }

    #[test]
    fn test_empty_render() {
        let collector = MeterCollector::new("pmxxx");
        let output = collector.render();

        assert!(!output.contains("pmxxx_up"));
        assert!(output.contains("pmxxx_exporter_meters 0"));
        assert!(!collector.stats().has_reports());
    }

    #[test]
    fn test_stats() {
        let collector = MeterCollector::new("pmxxx");
        collector.on_update(&snapshot("a", true, sample_values()));
        collector.on_down(&snapshot("b", false, FieldValues::new()));

        let stats = collector.stats();
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.downs, 1);
        assert!(stats.has_reports());
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(42.5), "42.5");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }
}
