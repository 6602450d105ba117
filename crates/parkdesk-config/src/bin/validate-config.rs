//! Config validation CLI tool
//!
//! Validates a parkdesk configuration file and reports any errors.

use parkdesk_config::{ConfigError, CURRENT_CONFIG_VERSION, load_config};
use parkdesk_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a parkdesk configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Endpoint: {}", settings.service.endpoint);
            println!(
                "  Auth token: ${} ({})",
                settings.service.auth_token_env,
                if settings.service.auth_token().is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
            println!(
                "  Request timeout: {}s",
                settings.service.request_timeout.as_secs()
            );
            println!("  Data dir: {}", settings.service.data_dir.display());
            println!("  Capacity: {} slots", settings.facility.capacity);
            println!(
                "  Refresh: sessions every {}s, dashboard every {}s",
                settings.facility.session_refresh.as_secs(),
                settings.facility.dashboard_refresh.as_secs()
            );
            println!("  Currency: {}", settings.display.currency_symbol);

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
