//! Read-only transaction history

use chrono::{DateTime, Utc};
use parkdesk_util::{SessionId, VehicleId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{VehicleType, wire};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Filters for `transactionHistory`, passed through unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            status: None,
            vehicle_type: None,
            start_date: None,
            end_date: None,
            search: None,
        }
    }
}

/// One completed or in-progress transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: VehicleId,
    pub session_id: SessionId,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub driver_phone: Option<String>,
    #[serde(deserialize_with = "wire::timestamp")]
    pub entry_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "wire::opt_timestamp")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_amount")]
    pub base_fee_paid: Option<Decimal>,
    #[serde(default, deserialize_with = "wire::opt_amount")]
    pub overstay_fee: Option<Decimal>,
    #[serde(default, deserialize_with = "wire::opt_amount")]
    pub total_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<TransactionRecord>,
    #[serde(deserialize_with = "wire::count")]
    pub total_count: u32,
}

impl HistoryPage {
    pub fn total_pages(&self, page_size: u32) -> u32 {
        if page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(page_size)
    }
}
