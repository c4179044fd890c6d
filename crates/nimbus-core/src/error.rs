//! Centralized error types for the Nimbus application.
//!
//! Every failure the shell can see converts into [`AppError`], and
//! `user_message()` gives the text to show in place of the technical detail.

use nimbus_weather::{ClientBuildError, WeatherFetchError};
use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherFetchError),

    #[error(transparent)]
    Client(#[from] ClientBuildError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Client(_) => "Secure connection setup failed. Check your network settings.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_weather::FetchError;

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = WeatherFetchError::MissingCredential.into();
        assert!(matches!(
            app_err,
            AppError::Weather(WeatherFetchError::MissingCredential)
        ));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Weather(WeatherFetchError::Current(FetchError::Status {
            endpoint: "https://api.test/weather".to_string(),
            status: 401,
            message: "Invalid API key".to_string(),
        }));
        assert_eq!(
            app_err.user_message(),
            "Weather API key is invalid. Check settings."
        );

        let config_err = AppError::from(ConfigError::Invalid("cache.max_entries".into()));
        assert!(config_err.user_message().contains("settings"));
    }
}
