//! Alert dedup against both stores, including concurrent triggers for one key.

use chrono::{DateTime, Duration, Utc};
use delay_risk::alerts::{AlertDecision, AlertPolicy, AlertStore, MemoryAlertStore};
use delay_risk::config::AlertConfig;
use delay_risk::inference::PredictionResult;
use delay_risk::risk::RiskLevel;
use delay_risk::storage::SqliteAlertStore;
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};

fn prediction(shipment_id: &str, p: f64) -> PredictionResult {
    PredictionResult {
        shipment_id: shipment_id.into(),
        delay_probability: p,
        risk_level: RiskLevel::High,
        estimated_delay_minutes: 150,
        prediction_timestamp: Utc::now(),
        model_version: "1.0.0".into(),
        features: BTreeMap::new(),
        error: None,
    }
}

fn is_emit(d: &Option<AlertDecision>) -> bool {
    matches!(d, Some(AlertDecision::Emit(_)))
}

fn dedup_lifecycle(store: &dyn AlertStore) {
    let policy = AlertPolicy::new(AlertConfig::default());
    let t0: DateTime<Utc> = Utc::now();
    let p = prediction("S1", 0.85);

    let first = policy.raise(&p, store, t0).unwrap();
    let first_id = match &first {
        Some(AlertDecision::Emit(a)) => a.alert_id,
        other => panic!("expected emit, got {other:?}"),
    };

    let second = policy.raise(&p, store, t0 + Duration::minutes(10)).unwrap();
    assert_eq!(second, Some(AlertDecision::Suppressed { existing: first_id }));

    // Below threshold: no decision at all.
    assert_eq!(policy.raise(&prediction("S1", 0.65), store, t0).unwrap(), None);

    // Outside the window the old alert no longer blocks.
    let later = policy.raise(&p, store, t0 + Duration::minutes(61)).unwrap();
    let later_id = match later {
        Some(AlertDecision::Emit(a)) => a.alert_id,
        other => panic!("expected emit, got {other:?}"),
    };

    // Resolving the blocking alert re-opens the key.
    let at = t0 + Duration::minutes(62);
    store.resolve(later_id, Some("dispatcher"), at).unwrap();
    assert!(is_emit(&policy.raise(&p, store, at).unwrap()));

    // Resolved alerts stay resolved.
    let resolved = store.get(later_id).unwrap().unwrap();
    assert!(!resolved.is_active);
    assert_eq!(resolved.resolved_by.as_deref(), Some("dispatcher"));
    assert!(store.resolve(later_id, None, at).is_err());
}

#[test]
fn dedup_lifecycle_memory() {
    dedup_lifecycle(&MemoryAlertStore::new());
}

#[test]
fn dedup_lifecycle_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteAlertStore::open(&dir.path().join("alerts.db")).unwrap();
    dedup_lifecycle(&store);
}

#[test]
fn concurrent_triggers_emit_once_memory() {
    let store = Arc::new(MemoryAlertStore::new());
    let policy = Arc::new(AlertPolicy::new(AlertConfig::default()));
    let now = Utc::now();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let (store, policy, barrier) = (store.clone(), policy.clone(), barrier.clone());
            std::thread::spawn(move || {
                barrier.wait();
                policy
                    .raise(&prediction("S-RACE", 0.9), store.as_ref(), now)
                    .unwrap()
            })
        })
        .collect();
    let emitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(is_emit)
        .count();
    assert_eq!(emitted, 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn concurrent_triggers_emit_once_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.db");
    // Create the schema before the race.
    drop(SqliteAlertStore::open(&path).unwrap());

    let now = Utc::now();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let path = path.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                let store = SqliteAlertStore::open(&path).unwrap();
                let policy = AlertPolicy::new(AlertConfig::default());
                barrier.wait();
                policy.raise(&prediction("S-RACE", 0.9), &store, now).unwrap()
            })
        })
        .collect();
    let emitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(is_emit)
        .count();
    assert_eq!(emitted, 1);

    let store = SqliteAlertStore::open(&path).unwrap();
    assert_eq!(store.active_alerts(10).unwrap().len(), 1);
}

#[test]
fn summary_covers_display_window() {
    let store = MemoryAlertStore::new();
    let policy = AlertPolicy::new(AlertConfig::default());
    let now = Utc::now();
    policy.raise(&prediction("A", 0.95), &store, now).unwrap();
    policy.raise(&prediction("B", 0.72), &store, now).unwrap();
    policy
        .raise(&prediction("C", 0.9), &store, now - Duration::hours(30))
        .unwrap();

    let s = store.summary(now - Duration::hours(24)).unwrap();
    assert_eq!((s.total, s.active, s.high, s.medium), (2, 2, 1, 1));
    assert_eq!(store.active_alerts(10).unwrap().len(), 3);
}
