//! Builders shared by the unit tests

use chrono::{DateTime, TimeZone, Utc};
use parkdesk_api::{PricingRule, SessionStatus, VehicleSession, VehicleType};
use parkdesk_util::{RuleId, SessionId, VehicleId};
use rust_decimal::Decimal;

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, hour, minute, 0).unwrap()
}

pub fn rule(vehicle_type: &str, base_fee: i64, base_hours: u32, extra_hour_rate: i64) -> PricingRule {
    PricingRule {
        id: RuleId::new(format!("rule-{vehicle_type}")),
        vehicle_type: VehicleType::parse(vehicle_type),
        base_fee: Decimal::from(base_fee),
        base_hours,
        extra_hour_rate: Decimal::from(extra_hour_rate),
    }
}

pub fn standard_rules() -> Vec<PricingRule> {
    vec![rule("car", 50, 2, 20), rule("bike", 20, 2, 10)]
}

pub fn session(id: &str, vehicle_type: &str, entry_time: DateTime<Utc>) -> VehicleSession {
    VehicleSession {
        id: VehicleId::new(format!("v-{id}")),
        session_id: SessionId::new(id),
        driver_phone: "9876543210".into(),
        vehicle_type: VehicleType::parse(vehicle_type),
        vehicle_number: Some(format!("KL01AB{id}")),
        entry_time,
        status: SessionStatus::Active,
        base_fee_paid: Decimal::from(50),
        duration_minutes: None,
        is_overstay: None,
        overstay_minutes: None,
        declared_duration_hours: None,
    }
}
