//! GraphQL backend for parkdesk
//!
//! Speaks the parking service's GraphQL API over HTTP POST with bearer
//! authentication. One request per backend operation, no retries and no
//! response caching.

mod client;
mod documents;

pub use client::*;
