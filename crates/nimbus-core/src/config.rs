use anyhow::{Context, Result};
use nimbus_weather::{
    settings, CacheSettings, Endpoints, HistorySettings, ProviderConfig, Units,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `provider.api_key`
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const API_KEY_PLACEHOLDER: &str = "YOUR_OPENWEATHER_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Weather provider credential and request preferences
    #[serde(default)]
    pub provider: ProviderSection,

    /// Provider endpoint URLs
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observation history settings
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    /// OpenWeatherMap API key
    /// Create at: https://home.openweathermap.org/api_keys
    pub api_key: String,

    #[serde(default)]
    pub units: Units,

    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            api_key: API_KEY_PLACEHOLDER.to_string(),
            units: Units::Metric,
            language: default_language(),
        }
    }
}

impl ProviderSection {
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(self.api_key.trim(), self.units, self.language.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub current_weather_url: String,
    pub forecast_url: String,
    pub geocoding_url: String,
    pub alerts_url: String,
    pub ip_geolocation_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        let endpoints = Endpoints::default();
        Self {
            current_weather_url: endpoints.current_weather,
            forecast_url: endpoints.forecast,
            geocoding_url: endpoints.geocoding,
            alerts_url: endpoints.alerts,
            ip_geolocation_url: endpoints.ip_geolocation,
        }
    }
}

impl EndpointsConfig {
    /// Every endpoint rooted at `base_url`
    pub fn with_base_url(base_url: &str) -> Self {
        let endpoints = Endpoints::with_base_url(base_url);
        Self {
            current_weather_url: endpoints.current_weather,
            forecast_url: endpoints.forecast,
            geocoding_url: endpoints.geocoding,
            alerts_url: endpoints.alerts,
            ip_geolocation_url: endpoints.ip_geolocation,
        }
    }

    pub fn to_endpoints(&self) -> Endpoints {
        Endpoints {
            current_weather: self.current_weather_url.clone(),
            forecast: self.forecast_url.clone(),
            geocoding: self.geocoding_url.clone(),
            alerts: self.alerts_url.clone(),
            ip_geolocation: self.ip_geolocation_url.clone(),
        }
    }

    fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("endpoints.current_weather_url", &self.current_weather_url),
            ("endpoints.forecast_url", &self.forecast_url),
            ("endpoints.geocoding_url", &self.geocoding_url),
            ("endpoints.alerts_url", &self.alerts_url),
            ("endpoints.ip_geolocation_url", &self.ip_geolocation_url),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a response is served from memory before it is refetched
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,

    /// Per-request network timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of distinct requests kept in memory
    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,
}

fn default_freshness_secs() -> u64 {
    settings::DEFAULT_FRESHNESS_SECS
}

fn default_timeout_secs() -> u64 {
    settings::DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_cache_entries() -> u64 {
    settings::DEFAULT_CACHE_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_secs: default_freshness_secs(),
            timeout_secs: default_timeout_secs(),
            max_entries: default_cache_entries(),
        }
    }
}

impl CacheConfig {
    pub fn to_settings(&self) -> CacheSettings {
        CacheSettings {
            freshness: Duration::from_secs(self.freshness_secs),
            request_timeout: Duration::from_secs(self.timeout_secs),
            max_entries: self.max_entries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// History document location (defaults to the platform data directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_history_entries")]
    pub max_entries_per_location: usize,
}

fn default_history_entries() -> usize {
    settings::DEFAULT_HISTORY_MAX_ENTRIES
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_entries_per_location: default_history_entries(),
        }
    }
}

impl HistoryConfig {
    pub fn to_settings(&self) -> HistorySettings {
        let path = self
            .path
            .clone()
            .unwrap_or_else(HistorySettings::default_path);
        HistorySettings::new(path).with_max_entries(self.max_entries_per_location)
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist.
    /// `OPENWEATHER_API_KEY`, when set, replaces the configured key.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_api_key_override(std::env::var(API_KEY_ENV).ok()))
    }

    /// Load from an explicit path, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config = Self::parse(&contents)?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Replace the API key when `api_key` holds a non-blank value
    pub fn with_api_key_override(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            tracing::debug!("Using API key from {}", API_KEY_ENV);
            self.provider.api_key = key;
        }
        self
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        for (field, url) in self.endpoints.fields() {
            validate_url(url, field, &mut result);
        }

        if !self.provider.to_provider_config().has_credential() {
            result.add_warning(
                "provider.api_key",
                format!(
                    "No API key configured - set it here or in {}",
                    API_KEY_ENV
                ),
            );
        }

        if self.provider.language.trim().is_empty() {
            result.add_error("provider.language", "Language must not be empty");
        }

        if self.cache.timeout_secs == 0 {
            result.add_error("cache.timeout_secs", "Request timeout must be greater than 0");
        } else if self.cache.timeout_secs > 120 {
            result.add_warning(
                "cache.timeout_secs",
                "Request timeout is unusually long (>120 seconds)",
            );
        }

        if self.cache.freshness_secs == 0 {
            result.add_warning(
                "cache.freshness_secs",
                "Caching disabled (0 seconds) - every query goes to the network",
            );
        }

        if self.cache.max_entries == 0 {
            result.add_error("cache.max_entries", "Cache capacity must be greater than 0");
        }

        if self.history.max_entries_per_location == 0 {
            result.add_error(
                "history.max_entries_per_location",
                "History retention must be greater than 0",
            );
        }

        if let Some(path) = &self.history.path {
            if path.is_dir() {
                result.add_error(
                    "history.path",
                    format!("Path is a directory: {}", path.display()),
                );
            }
        }

        result
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("nimbus");

        Ok(config_dir.join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }

            if url.port() == Some(0) {
                result.add_error(field_name, "Port cannot be 0");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}
