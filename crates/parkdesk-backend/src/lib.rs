//! Backend interface for the remote parking service
//!
//! This crate defines the operations the console consumes from the
//! parking service. It contains no transport code itself; see
//! `parkdesk-graphql` for the HTTP implementation.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
