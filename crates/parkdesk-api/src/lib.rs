//! Wire types for the parking service
//!
//! This crate defines the shapes exchanged with the remote parking API:
//! - Sessions, pricing rules, and dashboard stats (queries)
//! - Entry, exit, and payment receipts (mutations)
//! - Transaction history pages
//! - Lenient decoding of amounts and timestamps

mod history;
mod money;
mod receipts;
mod types;
pub mod wire;

pub use history::*;
pub use money::*;
pub use receipts::*;
pub use types::*;
