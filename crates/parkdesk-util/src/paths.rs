//! Default paths for parkdesk components
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/parkdesk/config.toml` or `~/.config/parkdesk/config.toml`
//! - Data: `$XDG_DATA_HOME/parkdesk` or `~/.local/share/parkdesk`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const PARKDESK_CONFIG_ENV: &str = "PARKDESK_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "parkdesk";

const CONFIG_FILENAME: &str = "config.toml";

/// Name of the local ledger database inside the data directory
pub const STORE_FILENAME: &str = "parkdesk.db";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$PARKDESK_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/parkdesk/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/parkdesk/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(PARKDESK_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    config_path_without_env()
}

/// Get the config path without checking the PARKDESK_CONFIG env var.
pub fn config_path_without_env() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"], "config").join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// `PARKDESK_DATA_DIR` is not consulted here; the binary applies it as an
/// override on top of the configured value.
pub fn default_data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"], "data")
}

fn xdg_dir(xdg_var: &str, home_relative: &[&str], last_resort: &str) -> PathBuf {
    if let Ok(base) = std::env::var(xdg_var) {
        return PathBuf::from(base).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        let mut path = PathBuf::from(home);
        path.extend(home_relative);
        return path.join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join(last_resort)
}
