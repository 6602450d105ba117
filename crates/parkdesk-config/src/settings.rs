//! Validated settings structures

use crate::schema::{RawConfig, RawDisplayConfig, RawFacilityConfig, RawServiceConfig};
use parkdesk_util::default_data_dir;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/graphql";
pub const DEFAULT_AUTH_TOKEN_ENV: &str = "PARKDESK_TOKEN";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CAPACITY: u32 = 50;
pub const DEFAULT_REFRESH_SECS: u64 = 30;
pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

/// Validated settings ready for use by the console
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub facility: FacilitySettings,
    pub display: DisplaySettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceSettings::from_raw(raw.service),
            facility: FacilitySettings::from_raw(raw.facility),
            display: DisplaySettings::from_raw(raw.display),
        }
    }
}

/// Remote service settings
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub auth_token_env: String,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            endpoint: raw.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            auth_token_env: raw
                .auth_token_env
                .unwrap_or_else(|| DEFAULT_AUTH_TOKEN_ENV.to_string()),
            request_timeout: Duration::from_secs(
                raw.request_timeout_seconds
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }

    /// Bearer token from the configured environment variable, if set
    pub fn auth_token(&self) -> Option<String> {
        std::env::var(&self.auth_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Facility settings
#[derive(Debug, Clone)]
pub struct FacilitySettings {
    /// Slot count; occupancy is clamped to 100% of this
    pub capacity: u32,
    pub session_refresh: Duration,
    pub dashboard_refresh: Duration,
}

impl FacilitySettings {
    fn from_raw(raw: RawFacilityConfig) -> Self {
        Self {
            capacity: raw.capacity.unwrap_or(DEFAULT_CAPACITY),
            session_refresh: Duration::from_secs(
                raw.session_refresh_seconds.unwrap_or(DEFAULT_REFRESH_SECS),
            ),
            dashboard_refresh: Duration::from_secs(
                raw.dashboard_refresh_seconds.unwrap_or(DEFAULT_REFRESH_SECS),
            ),
        }
    }
}

impl Default for FacilitySettings {
    fn default() -> Self {
        Self::from_raw(RawFacilityConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub currency_symbol: String,
}

impl DisplaySettings {
    fn from_raw(raw: RawDisplayConfig) -> Self {
        Self {
            currency_symbol: raw
                .currency_symbol
                .unwrap_or_else(|| DEFAULT_CURRENCY_SYMBOL.to_string()),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self::from_raw(RawDisplayConfig::default())
    }
}
