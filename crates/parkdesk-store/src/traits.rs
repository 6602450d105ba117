//! Store trait definitions

use chrono::{DateTime, Utc};
use parkdesk_util::ChargeId;

use crate::{AuditEvent, StoreResult, UnsettledCharge};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Unsettled-charge ledger

    /// Record a charge whose collection failed. Re-recording the same
    /// charge updates its error and clears any settlement.
    fn record_unsettled_charge(&self, charge: &UnsettledCharge) -> StoreResult<()>;

    /// Get one ledger entry, settled or not
    fn get_charge(&self, charge_id: &ChargeId) -> StoreResult<Option<UnsettledCharge>>;

    /// Charges still owed, oldest exit first
    fn list_unsettled_charges(&self) -> StoreResult<Vec<UnsettledCharge>>;

    /// Update the last collection error of an unsettled charge
    fn update_charge_error(&self, charge_id: &ChargeId, error: &str) -> StoreResult<()>;

    /// Mark a charge settled. Returns false if it was unknown or already settled.
    fn mark_charge_settled(&self, charge_id: &ChargeId, at: DateTime<Utc>) -> StoreResult<bool>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
