//! Error types for parkdesk

use thiserror::Error;

/// Error type for shared utilities
#[derive(Debug, Error)]
pub enum ParkdeskError {
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ParkdeskError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ParkdeskError>;
