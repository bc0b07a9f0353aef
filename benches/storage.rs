//! Alert store benchmark: conditional insert (emit and suppress paths).

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use delay_risk::alerts::{Alert, AlertStore, Severity};
use delay_risk::storage::SqliteAlertStore;
use tempfile::tempdir;
use uuid::Uuid;

fn alert(shipment_id: String) -> Alert {
    Alert {
        alert_id: Uuid::new_v4(),
        title: format!("High Delay Risk - {}", shipment_id),
        shipment_id,
        alert_type: "delay_prediction".to_string(),
        severity: Severity::High,
        message: "Shipment has 91.0% probability of delay. Estimated delay: 218 minutes.".to_string(),
        metadata: serde_json::Map::new(),
        triggered_at: Utc::now(),
        is_active: true,
        resolved_at: None,
        resolved_by: None,
    }
}

fn bench_insert_alert(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = SqliteAlertStore::open(&dir.path().join("alerts.db")).unwrap();
    let since = Utc::now() - Duration::hours(1);
    let mut n = 0u64;

    c.bench_function("alert_insert_new_key", |b| {
        b.iter(|| {
            n += 1;
            let a = alert(format!("S{}", n));
            black_box(store.insert_if_no_active(&a, since)).unwrap()
        })
    });
}

fn bench_suppressed_alert(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = SqliteAlertStore::open(&dir.path().join("alerts.db")).unwrap();
    let since = Utc::now() - Duration::hours(1);
    store.insert_if_no_active(&alert("S1".to_string()), since).unwrap();
    let dup = alert("S1".to_string());

    c.bench_function("alert_insert_suppressed", |b| {
        b.iter(|| black_box(store.insert_if_no_active(&dup, since)).unwrap())
    });
}

criterion_group!(benches, bench_insert_alert, bench_suppressed_alert);
criterion_main!(benches);
