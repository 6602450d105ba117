//! Integration tests for parkdesk
//!
//! These exercise a full operator shift against the mock backend and a
//! file-backed ledger.

use chrono::{Duration, Utc};
use parkdesk_api::{
    DashboardStats, ExitReceipt, OverstayRecord, PricingRule, SessionStatus, VehicleSession,
    VehicleType,
};
use parkdesk_backend::MockBackend;
use parkdesk_config::parse_config;
use parkdesk_core::{Console, CoreError, CoreEvent, EntryRequest, ExitStateKind, RefreshSource};
use parkdesk_store::{AuditEventType, SqliteStore, Store};
use parkdesk_util::{ChargeId, RuleId, SessionId, VehicleId};
use rust_decimal::Decimal;
use std::sync::Arc;

const CONFIG: &str = r#"
config_version = 1

[service]
endpoint = "https://parking.example.com/graphql"

[facility]
capacity = 4
session_refresh_seconds = 5
dashboard_refresh_seconds = 10

[display]
currency_symbol = "₹"
"#;

fn rules() -> Vec<PricingRule> {
    vec![
        PricingRule {
            id: RuleId::new("1"),
            vehicle_type: VehicleType::Car,
            base_fee: Decimal::from(50),
            base_hours: 2,
            extra_hour_rate: Decimal::from(20),
        },
        PricingRule {
            id: RuleId::new("2"),
            vehicle_type: VehicleType::Bike,
            base_fee: Decimal::from(20),
            base_hours: 2,
            extra_hour_rate: Decimal::from(10),
        },
    ]
}

fn parked(id: &str, vehicle_type: VehicleType, hours_ago: i64, minutes_ago: i64) -> VehicleSession {
    VehicleSession {
        id: VehicleId::new(format!("v-{id}")),
        session_id: SessionId::new(id),
        driver_phone: "9123456780".into(),
        vehicle_type,
        vehicle_number: Some(format!("KA05{id}")),
        entry_time: Utc::now() - Duration::hours(hours_ago) - Duration::minutes(minutes_ago),
        status: SessionStatus::Active,
        base_fee_paid: Decimal::from(50),
        duration_minutes: None,
        is_overstay: None,
        overstay_minutes: None,
        declared_duration_hours: None,
    }
}

#[tokio::test]
async fn test_shift_with_outstanding_overstay() {
    let settings = parse_config(CONFIG).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("parkdesk.db");

    let backend = Arc::new(
        MockBackend::new()
            .with_rules(rules())
            .with_sessions(vec![parked("S1", VehicleType::Car, 3, 30)]),
    );
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
    let console = Console::new(backend.clone(), store.clone(), &settings.facility);

    console.refresh_all().await;

    // Entry of a bike
    let receipt = console
        .log_entry(&EntryRequest::new("91234 56789", "ka05xy9", VehicleType::Bike))
        .await
        .unwrap();
    assert_eq!(receipt.base_fee_paid, Decimal::from(20));

    let views = console.visible_sessions("", Utc::now()).await;
    assert_eq!(views.len(), 2);
    // Oldest entry first, and it is overstaying
    assert_eq!(views[0].session.session_id, SessionId::new("S1"));
    assert!(views[0].is_overstay);
    assert!(!views[1].is_overstay);

    let summary = console.dashboard_summary().await.unwrap();
    assert_eq!(summary.derived.capacity, 4);
    assert_eq!(summary.derived.active_count, 2);
    assert_eq!(summary.derived.occupancy_rounded(), 50);

    // 3h30m parked with 2 base hours: 2 extra hours at 20
    let quote = console
        .open_exit(&SessionId::new("S1"), Utc::now())
        .await
        .unwrap();
    assert_eq!(quote.actual_duration_hours, 4);
    assert_eq!(quote.overstay_hours, 2);
    assert_eq!(quote.balance_due, Decimal::from(40));
    assert_eq!(quote.total_cost, Decimal::from(90));

    backend.set_exit_receipt(ExitReceipt {
        session_id: SessionId::new("S1"),
        total_amount: Decimal::from(90),
        overstay_fee: Decimal::from(40),
        overstay_record: Some(OverstayRecord {
            id: ChargeId::new("OC-1"),
            fee_amount: Decimal::from(40),
        }),
    });
    backend.set_fail_collect(true);

    let tx = console.confirm_exit(quote).await.unwrap();
    assert_eq!(tx.kind(), ExitStateKind::PaymentOutstanding);

    // The vehicle is gone from both views even though payment is owed
    assert_eq!(console.visible_sessions("", Utc::now()).await.len(), 1);
    assert_eq!(
        console.dashboard_summary().await.unwrap().derived.active_count,
        1
    );

    // The ledger survives a restart
    drop(console);
    drop(store);
    let reopened: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
    let unsettled = reopened.list_unsettled_charges().unwrap();
    assert_eq!(unsettled.len(), 1);
    assert_eq!(unsettled[0].charge_id, ChargeId::new("OC-1"));
    assert_eq!(unsettled[0].fee_amount, Decimal::from(40));

    // Operator collects it later
    backend.set_fail_collect(false);
    let console = Console::new(backend.clone(), reopened.clone(), &settings.facility);
    let collected = console
        .collect_outstanding(&ChargeId::new("OC-1"))
        .await
        .unwrap();
    assert!(collected.is_collected);
    assert!(console.unsettled_charges().unwrap().is_empty());

    let audits = reopened.get_recent_audits(50).unwrap();
    assert!(
        audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::ChargeReconciled { .. }))
    );
    assert!(
        audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::ExitFinalized { .. }))
    );
}

#[tokio::test]
async fn test_trusted_stats_are_not_recomputed() {
    let settings = parse_config(CONFIG).unwrap();
    let backend = Arc::new(MockBackend::new().with_rules(rules()).with_sessions(vec![
        parked("S1", VehicleType::Car, 0, 30),
        parked("S2", VehicleType::Bike, 0, 10),
        parked("S3", VehicleType::Other("van".into()), 1, 0),
    ]));
    backend.set_stats(DashboardStats {
        active_vehicles: 99,
        completed_today: 12,
        base_fees_collected: Decimal::from(600),
        overstay_fees_collected: Decimal::new(12050, 2),
        total_revenue_today: Decimal::new(72050, 2),
    });
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let console = Console::new(backend, store, &settings.facility);

    console.refresh_dashboard().await;
    let summary = console.dashboard_summary().await.unwrap();

    assert_eq!(summary.trusted.active_vehicles, 99);
    assert_eq!(summary.trusted.total_revenue_today, Decimal::new(72050, 2));
    // Occupancy follows the service's count; the histogram follows the list
    assert_eq!(summary.derived.active_count, 99);
    assert_eq!(summary.derived.occupancy_rounded(), 100);
    assert_eq!(summary.derived.class_count("2W"), 1);
    assert_eq!(summary.derived.class_count("4W"), 1);
    assert_eq!(summary.derived.class_count("van"), 1);
}

#[tokio::test]
async fn test_events_follow_entry() {
    let settings = parse_config(CONFIG).unwrap();
    let backend = Arc::new(MockBackend::new().with_rules(rules()));
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let console = Console::new(backend, store, &settings.facility);
    let mut events = console.subscribe();

    console
        .log_entry(&EntryRequest::new("9123456780", "KA05AB1", VehicleType::Car))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(matches!(seen[0], CoreEvent::EntryLogged { .. }));
    assert!(seen.contains(&CoreEvent::Refreshed {
        source: RefreshSource::Sessions,
        count: 1
    }));
    assert!(seen.contains(&CoreEvent::Refreshed {
        source: RefreshSource::Dashboard,
        count: 1
    }));
}

#[tokio::test]
async fn test_unpriced_class_is_rejected_before_any_call() {
    let settings = parse_config(CONFIG).unwrap();
    let backend = Arc::new(MockBackend::new().with_rules(rules()));
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let console = Console::new(backend.clone(), store, &settings.facility);

    let err = console
        .log_entry(&EntryRequest::new(
            "9123456780",
            "KA05AB1",
            VehicleType::parse("truck"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::RuleNotFound(_)));
    assert!(err.is_local_validation());
    assert!(backend.calls().entries.is_empty());
}
