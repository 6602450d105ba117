//! Backend trait definitions

use async_trait::async_trait;
use parkdesk_api::{
    CollectionReceipt, DashboardData, EntryReceipt, ExitReceipt, HistoryPage, HistoryQuery,
    MonitorData, PricingRule, VehicleEntryInput,
};
use parkdesk_util::{ChargeId, SessionId};
use thiserror::Error;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response (connect, timeout, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The service answered with GraphQL errors
    #[error("Remote error: {}", .0.join("; "))]
    Remote(Vec<String>),

    /// The response could not be decoded into the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(vec![msg.into()])
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Operations consumed from the parking service
///
/// Every call is a single remote request. Implementations never retry.
#[async_trait]
pub trait ParkingBackend: Send + Sync {
    /// Active sessions and pricing rules in one round trip
    async fn fetch_monitor_data(&self) -> BackendResult<MonitorData>;

    async fn fetch_pricing_rules(&self) -> BackendResult<Vec<PricingRule>>;

    /// Trusted stats plus a lightweight active-vehicle projection
    async fn fetch_dashboard(&self) -> BackendResult<DashboardData>;

    async fn log_vehicle_entry(&self, input: &VehicleEntryInput) -> BackendResult<EntryReceipt>;

    /// Phase 1 of an exit: finalizes the session and assesses the fee
    async fn process_vehicle_exit(&self, session_id: &SessionId) -> BackendResult<ExitReceipt>;

    /// Phase 2 of an exit: marks an overstay charge as collected
    async fn collect_overstay_payment(
        &self,
        charge_id: &ChargeId,
    ) -> BackendResult<CollectionReceipt>;

    async fn transaction_history(&self, query: &HistoryQuery) -> BackendResult<HistoryPage>;
}
