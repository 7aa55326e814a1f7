//! End-to-end tests polling a fake meter over real HTTP.
//!
//! A local axum server stands in for the meters: the root path serves a
//! healthy status page, and path prefixes give misbehaving ones.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use pmxxx_common::{FIELD_COUNT, Field};
use pmxxx_poller::mock::{CallbackEvent, RecordingCallbacks, ascending_status_page, status_page};
use pmxxx_poller::{HttpFetcher, PollerConfig, PollingEngine};

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

async fn healthy(State(hits): State<Hits>) -> String {
    hits.0.fetch_add(1, Ordering::SeqCst);
    ascending_status_page()
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn short() -> String {
    status_page(&[1.0; 10])
}

async fn slow() -> String {
    tokio::time::sleep(Duration::from_secs(5)).await;
    ascending_status_page()
}

/// Start a fake meter server and return its address and hit counter.
async fn start_fake_meter() -> (SocketAddr, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/scd.xml", get(healthy))
        .route("/broken/scd.xml", get(broken))
        .route("/short/scd.xml", get(short))
        .route("/slow/scd.xml", get(slow))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hits)
}

fn engine_for(
    meters: Vec<String>,
    request_timeout_secs: f64,
) -> (PollingEngine, Arc<RecordingCallbacks>) {
    let config = PollerConfig {
        meters,
        cache_ttl_secs: 60.0,
        request_timeout_secs,
    };
    let callbacks = Arc::new(RecordingCallbacks::new());
    let engine =
        PollingEngine::from_config(&config, HttpFetcher::new().unwrap(), callbacks.clone())
            .unwrap();
    (engine, callbacks)
}

#[tokio::test]
async fn test_healthy_meter_over_http() {
    let (addr, hits) = start_fake_meter().await;
    let identity = addr.to_string();
    let (engine, callbacks) = engine_for(vec![identity.clone()], 2.0);

    let snapshots = engine.poll().await;

    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
    assert_eq!(snapshots.len(), 1);
    let meter = &snapshots[0];
    assert!(meter.is_up);
    assert_eq!(meter.values.get(Field::L1Volt), Some(1.0));
    assert_eq!(meter.values.get(Field::ThdIn), Some(FIELD_COUNT as f64));
    assert!(meter.last_success_ms.is_some());
    assert_eq!(
        callbacks.summary(),
        vec![(CallbackEvent::Update, identity)]
    );
}

#[tokio::test]
async fn test_mixed_meters_over_http() {
    let (addr, _) = start_fake_meter().await;
    let good = addr.to_string();
    let bad_status = format!("{}/broken", addr);
    let malformed = format!("{}/short", addr);
    let slow = format!("{}/slow", addr);

    let (engine, callbacks) = engine_for(
        vec![
            good.clone(),
            bad_status.clone(),
            malformed.clone(),
            slow.clone(),
        ],
        0.5,
    );

    let snapshots = engine.poll().await;

    let up: Vec<bool> = snapshots.iter().map(|m| m.is_up).collect();
    assert_eq!(up, vec![true, false, false, false]);
    assert_eq!(
        callbacks.summary(),
        vec![
            (CallbackEvent::Update, good),
            (CallbackEvent::Down, bad_status),
            (CallbackEvent::Down, malformed),
            (CallbackEvent::Down, slow),
        ]
    );
    assert!(snapshots[2].values.is_empty());
}

#[tokio::test]
async fn test_cache_gate_over_http() {
    let (addr, hits) = start_fake_meter().await;
    let (engine, _) = engine_for(vec![addr.to_string()], 2.0);

    engine.poll().await;
    engine.poll().await;
    engine.poll().await;

    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_meter() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (engine, callbacks) = engine_for(vec![addr.to_string()], 1.0);
    let snapshots = engine.poll().await;

    assert!(!snapshots[0].is_up);
    assert_eq!(snapshots[0].consecutive_failures, 1);
    assert_eq!(callbacks.count(CallbackEvent::Down, &addr.to_string()), 1);
}

#[tokio::test]
async fn test_unregister_then_poll() {
    let (addr, hits) = start_fake_meter().await;
    let identity = addr.to_string();
    let (engine, callbacks) = engine_for(vec![identity.clone()], 2.0);

    engine.poll().await;
    assert!(engine.unregister(&identity));
    engine.cache().set_ttl(Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(5)).await;
    let snapshots = engine.poll().await;

    assert!(snapshots.is_empty());
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
    assert_eq!(
        callbacks.summary(),
        vec![
            (CallbackEvent::Update, identity.clone()),
            (CallbackEvent::Removed, identity),
        ]
    );
}
