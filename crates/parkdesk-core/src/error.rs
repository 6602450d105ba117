//! Core error type

use parkdesk_api::VehicleType;
use parkdesk_backend::BackendError;
use parkdesk_store::StoreError;
use parkdesk_util::{ChargeId, SessionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// No pricing rule for the class. Not retryable.
    #[error("No pricing rule for vehicle type '{0}'")]
    RuleNotFound(VehicleType),

    #[error("Duplicate pricing rule for vehicle type '{0}'")]
    DuplicateRule(VehicleType),

    #[error("Invalid pricing rule for '{vehicle_type}': {message}")]
    InvalidRule {
        vehicle_type: VehicleType,
        message: String,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Phone number must be 10 digits, got {0:?}")]
    InvalidPhone(String),

    #[error("Vehicle number is required")]
    MissingPlate,

    #[error("An exit is already in progress")]
    ExitInProgress,

    #[error("No unsettled charge {0}")]
    ChargeNotFound(ChargeId),

    #[error("Service did not mark charge {0} as collected")]
    PaymentNotCollected(ChargeId),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Errors caught before any remote call, fixable by correcting input
    pub fn is_local_validation(&self) -> bool {
        matches!(
            self,
            CoreError::RuleNotFound(_)
                | CoreError::InvalidPhone(_)
                | CoreError::MissingPlate
                | CoreError::SessionNotFound(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
