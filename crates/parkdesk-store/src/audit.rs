//! Audit event types

use chrono::{DateTime, Utc};
use parkdesk_util::{AttemptId, ChargeId, SessionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Console started
    ConsoleStarted,

    /// Console stopped
    ConsoleStopped,

    /// Configuration loaded
    ConfigLoaded { endpoint: String, capacity: u32 },

    /// Vehicle entry accepted by the service
    EntryLogged {
        session_id: SessionId,
        vehicle_number: String,
        vehicle_type: String,
        base_fee_paid: Decimal,
    },

    /// Phase 1 succeeded: the session is exited
    ExitFinalized {
        attempt_id: AttemptId,
        session_id: SessionId,
        total_amount: Decimal,
        overstay_fee: Decimal,
        quoted_balance: Decimal,
    },

    /// Phase 1 rejected: the session is still active
    ExitFailed {
        attempt_id: AttemptId,
        session_id: SessionId,
        error: String,
    },

    /// Overstay charge collected
    PaymentCollected {
        attempt_id: Option<AttemptId>,
        charge_id: ChargeId,
        fee_amount: Decimal,
    },

    /// Overstay charge left uncollected after the vehicle exited
    PaymentCollectionFailed {
        attempt_id: Option<AttemptId>,
        session_id: SessionId,
        charge_id: ChargeId,
        fee_amount: Decimal,
        error: String,
    },

    /// Operator settled a ledger entry
    ChargeReconciled { charge_id: ChargeId },
}

/// Full audit event with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: parkdesk_util::now(),
            event,
        }
    }
}
