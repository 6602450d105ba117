//! Mutation inputs and results

use parkdesk_util::{ChargeId, SessionId, VehicleId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{VehicleType, wire};

/// Input of `logVehicleEntry`. Values are already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleEntryInput {
    pub driver_phone: String,
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
}

/// Result of `logVehicleEntry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReceipt {
    pub id: VehicleId,
    pub session_id: SessionId,
    #[serde(deserialize_with = "wire::amount")]
    pub base_fee_paid: Decimal,
    #[serde(default)]
    pub vehicle_number: Option<String>,
}

/// Overstay charge created server-side when an exit assesses a fee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverstayRecord {
    pub id: ChargeId,
    #[serde(deserialize_with = "wire::amount")]
    pub fee_amount: Decimal,
}

/// Result of `processVehicleExit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitReceipt {
    pub session_id: SessionId,
    #[serde(deserialize_with = "wire::amount")]
    pub total_amount: Decimal,
    #[serde(default, deserialize_with = "wire::amount")]
    pub overstay_fee: Decimal,
    #[serde(default)]
    pub overstay_record: Option<OverstayRecord>,
}

impl ExitReceipt {
    /// The charge to collect, if the exit assessed a fee and created a record.
    pub fn collectable_charge(&self) -> Option<&OverstayRecord> {
        if self.overstay_fee > Decimal::ZERO {
            self.overstay_record.as_ref()
        } else {
            None
        }
    }
}

/// Result of `collectOverstayPayment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReceipt {
    pub id: ChargeId,
    pub is_collected: bool,
}
