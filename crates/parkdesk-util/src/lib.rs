//! Shared utilities for parkdesk
//!
//! This crate provides:
//! - ID types (SessionId, VehicleId, ChargeId, RuleId, AttemptId)
//! - Time utilities (mock-able clock, display helpers)
//! - Error types
//! - Default paths for the config file and data directory

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
