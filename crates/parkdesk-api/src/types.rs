//! Query result types for the parking service

use chrono::{DateTime, Utc};
use parkdesk_util::{RuleId, SessionId, VehicleId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::wire;

/// Vehicle class, matched case-insensitively
///
/// The service uses lowercase names (`bike`, `car`). Anything else is kept
/// under its own lowercase name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VehicleType {
    Bike,
    #[default]
    Car,
    Other(String),
}

impl VehicleType {
    pub fn parse(s: &str) -> Self {
        let key = s.trim().to_lowercase();
        match key.as_str() {
            "bike" => VehicleType::Bike,
            "car" => VehicleType::Car,
            _ => VehicleType::Other(key),
        }
    }

    /// Lowercase key used on the wire and for rule lookup
    pub fn key(&self) -> &str {
        match self {
            VehicleType::Bike => "bike",
            VehicleType::Car => "car",
            VehicleType::Other(name) => name,
        }
    }

    /// Dashboard class label: bikes are "2W", cars "4W"
    pub fn class_label(&self) -> &str {
        match self {
            VehicleType::Bike => "2W",
            VehicleType::Car => "4W",
            VehicleType::Other(name) => name,
        }
    }
}

impl From<String> for VehicleType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for VehicleType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<VehicleType> for String {
    fn from(v: VehicleType) -> Self {
        v.key().to_string()
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Session lifecycle. `Exited` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    #[serde(alias = "ACTIVE", alias = "Active")]
    Active,
    #[serde(
        alias = "EXITED",
        alias = "Exited",
        alias = "completed",
        alias = "COMPLETED"
    )]
    Exited,
}

/// One vehicle's stay as reported by `activeVehicles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSession {
    pub id: VehicleId,
    pub session_id: SessionId,
    pub driver_phone: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(deserialize_with = "wire::timestamp")]
    pub entry_time: DateTime<Utc>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, deserialize_with = "wire::amount")]
    pub base_fee_paid: Decimal,
    /// Server-computed elapsed minutes
    #[serde(default, deserialize_with = "wire::opt_minutes")]
    pub duration_minutes: Option<f64>,
    #[serde(default)]
    pub is_overstay: Option<bool>,
    #[serde(default, deserialize_with = "wire::opt_minutes")]
    pub overstay_minutes: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_count")]
    pub declared_duration_hours: Option<u32>,
}

impl VehicleSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Plate for display, "-" when the entry had none
    pub fn plate(&self) -> &str {
        self.vehicle_number.as_deref().unwrap_or("-")
    }
}

/// Billing parameters for one vehicle class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: RuleId,
    pub vehicle_type: VehicleType,
    #[serde(deserialize_with = "wire::amount")]
    pub base_fee: Decimal,
    #[serde(deserialize_with = "wire::count")]
    pub base_hours: u32,
    #[serde(deserialize_with = "wire::amount")]
    pub extra_hour_rate: Decimal,
}

/// Trusted daily aggregates computed by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(deserialize_with = "wire::count")]
    pub active_vehicles: u32,
    #[serde(deserialize_with = "wire::count")]
    pub completed_today: u32,
    #[serde(deserialize_with = "wire::amount")]
    pub base_fees_collected: Decimal,
    #[serde(deserialize_with = "wire::amount")]
    pub overstay_fees_collected: Decimal,
    #[serde(deserialize_with = "wire::amount")]
    pub total_revenue_today: Decimal,
}

/// Lightweight projection of an active vehicle used by the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVehicleBrief {
    pub id: VehicleId,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub is_overstay: Option<bool>,
}

/// Result of the monitor query: active sessions plus the pricing catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorData {
    #[serde(rename = "activeVehicles")]
    pub active_vehicles: Vec<VehicleSession>,
    #[serde(rename = "pricingRules")]
    pub pricing_rules: Vec<PricingRule>,
}

/// Result of the dashboard query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(rename = "dashboardStats")]
    pub stats: DashboardStats,
    #[serde(rename = "activeVehicles")]
    pub active_vehicles: Vec<ActiveVehicleBrief>,
}
