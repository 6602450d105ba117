//! Configuration validation

use crate::schema::RawConfig;
use reqwest::Url;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid endpoint '{value}': {message}")]
    InvalidEndpoint { value: String, message: String },

    #[error("Field '{field}' must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: u64,
        value: u64,
    },

    #[error("Field '{0}' cannot be empty")]
    Empty(&'static str),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(endpoint) = &config.service.endpoint {
        if let Err(message) = validate_endpoint(endpoint) {
            errors.push(ValidationError::InvalidEndpoint {
                value: endpoint.clone(),
                message,
            });
        }
    }

    if let Some(env) = &config.service.auth_token_env
        && env.trim().is_empty()
    {
        errors.push(ValidationError::Empty("service.auth_token_env"));
    }

    let minimums = [
        (
            "service.request_timeout_seconds",
            config.service.request_timeout_seconds,
        ),
        (
            "facility.capacity",
            config.facility.capacity.map(u64::from),
        ),
        (
            "facility.session_refresh_seconds",
            config.facility.session_refresh_seconds,
        ),
        (
            "facility.dashboard_refresh_seconds",
            config.facility.dashboard_refresh_seconds,
        ),
    ];
    for (field, value) in minimums {
        if let Some(value) = value
            && value < 1
        {
            errors.push(ValidationError::BelowMinimum {
                field,
                min: 1,
                value,
            });
        }
    }

    if let Some(symbol) = &config.display.currency_symbol
        && symbol.is_empty()
    {
        errors.push(ValidationError::Empty("display.currency_symbol"));
    }

    errors
}

/// Check that an endpoint is an absolute http(s) URL with a host
pub fn validate_endpoint(endpoint: &str) -> Result<(), String> {
    if endpoint.chars().any(char::is_whitespace) {
        return Err("contains whitespace".into());
    }

    let url = Url::parse(endpoint).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("missing host".into());
    }

    Ok(())
}
