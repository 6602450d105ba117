//! Billing and live-reconciliation core for parkdesk
//!
//! This crate is the heart of parkdesk, containing:
//! - Pricing catalog lookup
//! - Exit quotes (ceil-hour billing with overstay)
//! - Session monitor with sequence-stamped snapshot replace
//! - Dashboard aggregation (trusted stats vs derived figures)
//! - Two-phase exit coordination (Quoted -> ExitedPendingPayment -> Settled)
//! - Entry validation
//! - The `Console` facade tying these to a backend and a store

mod catalog;
mod console;
mod dashboard;
mod entry;
mod error;
mod events;
mod exit;
mod monitor;
mod quote;
mod snapshot;

#[cfg(test)]
mod test_support;

pub use catalog::*;
pub use console::*;
pub use dashboard::*;
pub use entry::*;
pub use error::*;
pub use events::*;
pub use exit::*;
pub use monitor::*;
pub use quote::*;
pub use snapshot::*;
