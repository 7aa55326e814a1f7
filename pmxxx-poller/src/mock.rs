//! Scripted meters for testing.
//!
//! Provides a [`MeterFetcher`] whose answers are set per identity, plus
//! helpers that render realistic status pages, so the engine can be
//! exercised without real devices.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pmxxx_common::{FIELD_COUNT, Field};

use crate::callbacks::MeterCallbacks;
use crate::error::{PollerError, Result};
use crate::fetch::MeterFetcher;
use crate::meter::MeterSnapshot;

/// Render a status page carrying `values` in field order.
pub fn status_page(values: &[f64]) -> String {
    let mut page = String::from("<scd>\n");
    for (i, value) in values.iter().enumerate() {
        let tag = Field::ALL
            .get(i)
            .map(|f| f.as_str().replace(|c: char| c.is_ascii_digit(), "x"))
            .unwrap_or_else(|| "extra".to_string());
        page.push_str(&format!("  <{tag}>{value:?}</{tag}>\n"));
    }
    page.push_str("</scd>\n");
    page
}

/// Status page with `1.0, 2.0, ...` for every field.
pub fn ascending_status_page() -> String {
    let values: Vec<f64> = (1..=FIELD_COUNT).map(|i| i as f64).collect();
    status_page(&values)
}

/// How a scripted meter answers.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// 200 OK with this body.
    Page(String),
    /// A non-200 status.
    Status(u16),
    /// No answer until the request timeout elapses.
    Timeout,
    /// Connection refused.
    Unreachable,
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, MockResponse>,
    calls: Vec<String>,
}

/// A [`MeterFetcher`] that answers from a script and records every call.
///
/// Clones share the same script and call log. Identities without a
/// scripted response are unreachable.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockState>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how `identity` answers from now on.
    pub fn respond(&self, identity: &str, response: MockResponse) {
        self.state
            .lock()
            .responses
            .insert(identity.to_string(), response);
    }

    /// Identities fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Total number of fetches.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of fetches for one identity.
    pub fn calls_for(&self, identity: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.as_str() == identity)
            .count()
    }
}

impl MeterFetcher for MockFetcher {
    async fn fetch(&self, identity: &str, timeout: Duration) -> Result<String> {
        let response = {
            let mut state = self.state.lock();
            state.calls.push(identity.to_string());
            state
                .responses
                .get(identity)
                .cloned()
                .unwrap_or(MockResponse::Unreachable)
        };

        match response {
            MockResponse::Page(body) => Ok(body),
            MockResponse::Status(status) => Err(PollerError::BadStatus { status }),
            MockResponse::Timeout => {
                tokio::time::sleep(timeout).await;
                Err(PollerError::Network(format!(
                    "request timed out after {:?}",
                    timeout
                )))
            }
            MockResponse::Unreachable => {
                Err(PollerError::Network("connection refused".to_string()))
            }
        }
    }
}

/// A callback notification captured by [`RecordingCallbacks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackEvent {
    Update,
    Down,
    Removed,
}

/// [`MeterCallbacks`] that record every notification with its snapshot.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    events: Mutex<Vec<(CallbackEvent, MeterSnapshot)>>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification so far, in order.
    pub fn events(&self) -> Vec<(CallbackEvent, MeterSnapshot)> {
        self.events.lock().clone()
    }

    /// `(event, identity)` pairs, in order.
    pub fn summary(&self) -> Vec<(CallbackEvent, String)> {
        self.events
            .lock()
            .iter()
            .map(|(e, m)| (*e, m.identity.clone()))
            .collect()
    }

    /// How many times `event` fired for `identity`.
    pub fn count(&self, event: CallbackEvent, identity: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(e, m)| *e == event && m.identity == identity)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn record(&self, event: CallbackEvent, meter: &MeterSnapshot) {
        self.events.lock().push((event, meter.clone()));
    }
}

impl MeterCallbacks for RecordingCallbacks {
    fn on_update(&self, meter: &MeterSnapshot) {
        self.record(CallbackEvent::Update, meter);
    }

    fn on_down(&self, meter: &MeterSnapshot) {
        self.record(CallbackEvent::Down, meter);
    }

    fn on_removed(&self, meter: &MeterSnapshot) {
        self.record(CallbackEvent::Removed, meter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{numeric_tokens, parse_telemetry};

    #[test]
    fn test_status_page_tags_carry_no_digits() {
        let page = ascending_status_page();
        assert_eq!(numeric_tokens(&page).count(), FIELD_COUNT);

        let values = parse_telemetry(&page).unwrap();
        assert_eq!(values.get(Field::L1Volt), Some(1.0));
        assert_eq!(values.get(Field::ThdIn), Some(FIELD_COUNT as f64));
    }

    #[tokio::test]
    async fn test_mock_fetcher_script() {
        let fetcher = MockFetcher::new();
        fetcher.respond("a", MockResponse::Page("ok".to_string()));
        fetcher.respond("b", MockResponse::Status(503));

        let timeout = Duration::from_secs(1);
        assert_eq!(fetcher.fetch("a", timeout).await.unwrap(), "ok");
        assert!(matches!(
            fetcher.fetch("b", timeout).await,
            Err(PollerError::BadStatus { status: 503 })
        ));
        assert!(fetcher.fetch("c", timeout).await.is_err());
        assert_eq!(fetcher.calls(), vec!["a", "b", "c"]);
    }
}
