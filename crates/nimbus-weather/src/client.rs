//! Weather client: composes cached provider calls into weather queries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::instrument;

use crate::cache::HttpCache;
use crate::error::{ClientBuildError, WeatherFetchError};
use crate::settings::{CacheSettings, Endpoints};
use crate::types::{ConfigUpdate, GeoPoint, ProviderConfig, WeatherAlert, WeatherReport};
use crate::{geocode, location, parse};

/// Name recorded as `provider` on every snapshot this client builds
pub const PROVIDER_NAME: &str = "openweathermap";

/// Provider configuration shared between the client and the application shell.
pub type SharedProviderConfig = Arc<RwLock<ProviderConfig>>;

#[derive(Debug, Clone)]
pub struct WeatherClient {
    cache: HttpCache,
    endpoints: Arc<Endpoints>,
    config: SharedProviderConfig,
    request_timeout: Duration,
}

impl WeatherClient {
    pub fn new(
        config: ProviderConfig,
        endpoints: Endpoints,
        cache: CacheSettings,
    ) -> Result<Self, ClientBuildError> {
        Self::with_shared_config(Arc::new(RwLock::new(config)), endpoints, cache)
    }

    /// Build a client that reads an existing shared configuration.
    pub fn with_shared_config(
        config: SharedProviderConfig,
        endpoints: Endpoints,
        cache: CacheSettings,
    ) -> Result<Self, ClientBuildError> {
        Ok(Self {
            cache: HttpCache::new(cache)?,
            endpoints: Arc::new(endpoints),
            config,
            request_timeout: cache.request_timeout,
        })
    }

    /// Handle to the live configuration. Writes through it apply to the next call.
    pub fn config_handle(&self) -> SharedProviderConfig {
        Arc::clone(&self.config)
    }

    /// Copy of the configuration as it is right now
    pub fn config(&self) -> ProviderConfig {
        self.config.read().clone()
    }

    /// Apply any subset of credential, units and language.
    /// In-flight requests and already cached responses are unaffected.
    pub fn update_config(&self, update: ConfigUpdate) {
        if update.is_empty() {
            return;
        }
        self.config.write().apply(update);
        tracing::info!("Weather provider configuration updated");
    }

    pub fn cache(&self) -> &HttpCache {
        &self.cache
    }

    /// Current conditions and forecast for `location`.
    ///
    /// Both provider calls are always issued, concurrently. The query succeeds
    /// only if both succeed (from the network or the cache); when both fail,
    /// the error carries both causes.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_weather(&self, location: &str) -> Result<WeatherReport, WeatherFetchError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(WeatherFetchError::EmptyLocation);
        }

        let config = self.config();
        if !config.has_credential() {
            return Err(WeatherFetchError::MissingCredential);
        }

        let params = [
            ("q", location.to_string()),
            ("appid", config.api_key.clone()),
            ("units", config.units.as_param().to_string()),
            ("lang", config.language.clone()),
        ];

        let (current, forecast) = tokio::join!(
            self.cache.request(&self.endpoints.current_weather, params.clone()),
            self.cache.request(&self.endpoints.forecast, params),
        );

        let (current, forecast) = match (current, forecast) {
            (Ok(current), Ok(forecast)) => (current, forecast),
            (Err(e), Ok(_)) => return Err(WeatherFetchError::Current(e)),
            (Ok(_), Err(e)) => return Err(WeatherFetchError::Forecast(e)),
            (Err(current), Err(forecast)) => {
                return Err(WeatherFetchError::Both { current, forecast })
            }
        };

        let current = parse::current_conditions(&current, PROVIDER_NAME).map_err(|e| {
            WeatherFetchError::Parse {
                what: "current conditions",
                message: e.to_string(),
            }
        })?;
        let forecast =
            parse::forecast(&forecast, PROVIDER_NAME).map_err(|e| WeatherFetchError::Parse {
                what: "forecast",
                message: e.to_string(),
            })?;

        tracing::info!(
            "Fetched weather for {}: {} {}, {} forecast slots",
            location,
            current.snapshot.temperature,
            config.units.temperature_symbol(),
            forecast.entries.len()
        );

        Ok(WeatherReport {
            location: location.to_string(),
            resolved_name: current.place_name,
            units: config.units,
            utc_offset_secs: current
                .utc_offset_secs
                .or(forecast.utc_offset_secs)
                .unwrap_or(0),
            current: current.snapshot,
            forecast: forecast.entries,
            fetched_at: Utc::now(),
        })
    }

    /// Resolve `location` to coordinates (first match only).
    #[instrument(skip(self), level = "debug")]
    pub async fn geocode(&self, location: &str) -> Result<Option<GeoPoint>, WeatherFetchError> {
        let config = self.config();
        let params = [
            ("q", location.trim().to_string()),
            ("appid", config.api_key),
            ("limit", "1".to_string()),
        ];

        let payload = self
            .cache
            .request(&self.endpoints.geocoding, params)
            .await
            .map_err(WeatherFetchError::Geocode)?;

        geocode::first_match(&payload).map_err(|e| WeatherFetchError::Parse {
            what: "geocoding result",
            message: e.to_string(),
        })
    }

    /// Active weather alerts for `location`. Best-effort: any failure yields an empty list.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_alerts(&self, location: &str) -> Vec<WeatherAlert> {
        let point = match self.geocode(location).await {
            Ok(Some(point)) => point,
            Ok(None) => {
                tracing::debug!("No geocoding match for {}, no alerts", location);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Could not resolve {} for alerts: {}", location, e);
                return Vec::new();
            }
        };

        let config = self.config();
        let params = [
            ("lat", point.latitude.to_string()),
            ("lon", point.longitude.to_string()),
            ("appid", config.api_key),
            ("units", config.units.as_param().to_string()),
            ("lang", config.language),
            ("exclude", "minutely,hourly,daily".to_string()),
        ];

        match self.cache.request(&self.endpoints.alerts, params).await {
            Ok(payload) => {
                let alerts = parse::alerts(&payload);
                tracing::debug!("{} alerts for {}", alerts.len(), point.display_name());
                alerts
            }
            Err(e) => {
                tracing::warn!("Could not fetch alerts: {}", e);
                Vec::new()
            }
        }
    }

    /// City of the current public IP, if it can be determined.
    pub async fn detect_location(&self) -> Option<String> {
        location::detect_city(&self.endpoints.ip_geolocation, self.request_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Units;

    fn client() -> WeatherClient {
        WeatherClient::new(
            ProviderConfig::new("key-1", Units::Metric, "en"),
            Endpoints::with_base_url("http://127.0.0.1:9"),
            CacheSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_update_config_is_visible_through_handle() {
        let client = client();
        let handle = client.config_handle();

        client.update_config(ConfigUpdate::default().units(Units::Imperial));

        let config = handle.read().clone();
        assert_eq!(config.units, Units::Imperial);
        assert_eq!(config.api_key, "key-1");
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_shell_writes_reach_client() {
        let client = client();
        client.config_handle().write().language = "it".to_string();
        assert_eq!(client.config().language, "it");
    }

    #[tokio::test]
    async fn test_empty_location_rejected_without_network() {
        let err = client().fetch_weather("   ").await.unwrap_err();
        assert!(matches!(err, WeatherFetchError::EmptyLocation));
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_without_network() {
        let client = client();
        client.update_config(ConfigUpdate::default().api_key(""));
        let err = client.fetch_weather("Paris").await.unwrap_err();
        assert!(matches!(err, WeatherFetchError::MissingCredential));
    }
}
