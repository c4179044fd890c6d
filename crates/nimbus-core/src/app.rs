use std::sync::Arc;

use nimbus_weather::{
    ConfigUpdate, HistoryEntry, HistoryStore, Units, WeatherAlert, WeatherClient, WeatherReport,
    PROVIDER_NAME,
};

use crate::error::{AppError, ConfigError};
use crate::Config;

/// Application state: the weather client and the history store, built from one config
pub struct App {
    config: Config,
    client: WeatherClient,
    history: Arc<HistoryStore>,
}

impl App {
    /// Build the application from an already loaded configuration.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        let client = WeatherClient::new(
            config.provider.to_provider_config(),
            config.endpoints.to_endpoints(),
            config.cache.to_settings(),
        )?;
        let history = Arc::new(HistoryStore::open(config.history.to_settings()));

        tracing::info!(
            "Application initialized (history at {})",
            history.path().display()
        );

        Ok(Self {
            config,
            client,
            history,
        })
    }

    /// Load the configuration from disk and build the application
    pub fn load() -> anyhow::Result<Self> {
        let (config, _) = Config::load_validated()?;
        Ok(Self::new(config)?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &WeatherClient {
        &self.client
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// The location to query: `requested` when given, otherwise the detected one.
    pub async fn resolve_location(&self, requested: Option<&str>) -> Option<String> {
        match requested.map(str::trim).filter(|l| !l.is_empty()) {
            Some(location) => Some(location.to_string()),
            None => self.client.detect_location().await,
        }
    }

    /// Fetch current conditions and forecast, recording the observation in history.
    pub async fn refresh(&self, location: &str) -> Result<WeatherReport, AppError> {
        let report = self.client.fetch_weather(location).await?;

        let history = Arc::clone(&self.history);
        let key = report.location.clone();
        let snapshot = report.current.clone();
        tokio::task::spawn_blocking(move || history.add(&key, &snapshot, PROVIDER_NAME))
            .await
            .map_err(|e| AppError::Other(e.into()))?;

        Ok(report)
    }

    pub async fn alerts(&self, location: &str) -> Vec<WeatherAlert> {
        self.client.fetch_alerts(location).await
    }

    /// Recorded observations for `location` over the last `days_back` days, newest first
    pub fn recent_history(&self, location: &str, days_back: i64) -> Vec<HistoryEntry> {
        self.history.get_history(location, days_back, None)
    }

    /// Switch the unit system for subsequent queries
    pub fn set_units(&self, units: Units) {
        self.client.update_config(ConfigUpdate::default().units(units));
    }
}
