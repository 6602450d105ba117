//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Remote parking service settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Facility-level settings
    #[serde(default)]
    pub facility: RawFacilityConfig,

    #[serde(default)]
    pub display: RawDisplayConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// GraphQL endpoint URL
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the bearer token
    pub auth_token_env: Option<String>,

    /// Per-request timeout
    pub request_timeout_seconds: Option<u64>,

    /// Data directory for the local ledger
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFacilityConfig {
    /// Number of parking slots, used for occupancy
    pub capacity: Option<u32>,

    /// Active-session refresh interval
    pub session_refresh_seconds: Option<u64>,

    /// Dashboard refresh interval
    pub dashboard_refresh_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDisplayConfig {
    pub currency_symbol: Option<String>,
}
