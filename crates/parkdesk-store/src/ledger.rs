//! Unsettled overstay charges

use chrono::{DateTime, Utc};
use parkdesk_util::{ChargeId, SessionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An overstay charge that was assessed at exit but not collected
///
/// The vehicle has already left. Entries stay in the ledger until an
/// operator collects them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsettledCharge {
    pub charge_id: ChargeId,
    pub session_id: SessionId,
    pub vehicle_number: Option<String>,
    pub fee_amount: Decimal,
    pub exited_at: DateTime<Utc>,
    /// Most recent collection error
    pub last_error: String,
    pub settled_at: Option<DateTime<Utc>>,
}

impl UnsettledCharge {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}
