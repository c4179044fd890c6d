//! Error types for the weather data layer.
//!
//! Fetch failures propagate to the caller; history storage failures are
//! logged by the store and never reach callers of its public operations.

use std::path::PathBuf;
use thiserror::Error;

/// The underlying HTTP client could not be constructed (TLS backend, proxy settings).
#[derive(Debug, Error)]
#[error("Failed to create HTTP client: {0}")]
pub struct ClientBuildError(#[from] pub reqwest::Error);

/// A provider call failed and no cached response was available to fall back on.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} returned {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

impl FetchError {
    /// Build from a reqwest error, classifying timeouts separately.
    pub fn from_reqwest(endpoint: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if let Some(status) = error.status() {
            Self::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else if error.is_decode() {
            Self::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                message: error.to_string(),
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::Timeout { endpoint }
            | Self::Status { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::InvalidResponse { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status, when the provider answered with a non-2xx code
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "The weather service timed out. Please try again.",
            Self::Status { status: 401, .. } => "Weather API key is invalid. Check settings.",
            Self::Status { status: 404, .. } => {
                "Location not found. Check the spelling and try again."
            }
            Self::Status { status: 429, .. } => {
                "Too many weather requests. Please wait a moment and try again."
            }
            Self::Status { status, .. } if *status >= 500 => {
                "Weather service unavailable. Please try again later."
            }
            Self::Status { .. } => "Weather request failed. Please try again.",
            Self::Transport { .. } => {
                "Unable to reach the weather service. Check your internet connection."
            }
            Self::InvalidResponse { .. } => {
                "Received an unexpected response from the weather service."
            }
        }
    }
}

/// Composition-level failure of a weather query.
#[derive(Debug, Clone, Error)]
pub enum WeatherFetchError {
    #[error("No API key configured")]
    MissingCredential,

    #[error("Location must not be empty")]
    EmptyLocation,

    #[error("Current conditions: {0}")]
    Current(#[source] FetchError),

    #[error("Forecast: {0}")]
    Forecast(#[source] FetchError),

    #[error("Geocoding: {0}")]
    Geocode(#[source] FetchError),

    #[error("Current conditions: {current}; forecast: {forecast}")]
    Both {
        current: FetchError,
        forecast: FetchError,
    },

    #[error("Could not parse {what}: {message}")]
    Parse { what: &'static str, message: String },
}

impl WeatherFetchError {
    /// The underlying fetch failure, preferring current conditions when both failed
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::Current(e) | Self::Forecast(e) | Self::Geocode(e) => Some(e),
            Self::Both { current, .. } => Some(current),
            _ => None,
        }
    }

    /// Actionable message for display at the application boundary.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredential => "No weather API key is set. Add one in Settings.",
            Self::EmptyLocation => "Enter a location to look up the weather.",
            Self::Parse { .. } => "Received an unexpected response from the weather service.",
            _ => self
                .fetch_error()
                .map(FetchError::user_message)
                .unwrap_or("Weather service error. Please try again."),
        }
    }
}

/// The history document could not be read or parsed.
#[derive(Debug, Error)]
pub enum HistoryLoadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The history document could not be written.
#[derive(Debug, Error)]
pub enum HistoryPersistError {
    #[error("Failed to create history directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
