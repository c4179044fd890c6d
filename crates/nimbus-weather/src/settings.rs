//! Construction-time settings for the cache, client and history store.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FRESHNESS_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_CAPACITY: u64 = 256;
pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 1000;

const OWM_CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const OWM_FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";
const OWM_GEOCODING_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";
const OWM_ALERTS_URL: &str = "https://api.openweathermap.org/data/2.5/onecall";
const IP_GEOLOCATION_URL: &str = "https://ipinfo.io/json";

/// Addresses of the provider operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub current_weather: String,
    pub forecast: String,
    pub geocoding: String,
    pub alerts: String,
    pub ip_geolocation: String,
}

impl Endpoints {
    /// All endpoints rooted at one base URL, using the provider's path layout.
    /// Handy for pointing the client at a mock server.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            current_weather: format!("{}/data/2.5/weather", base),
            forecast: format!("{}/data/2.5/forecast", base),
            geocoding: format!("{}/geo/1.0/direct", base),
            alerts: format!("{}/data/2.5/onecall", base),
            ip_geolocation: format!("{}/json", base),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            current_weather: OWM_CURRENT_URL.to_string(),
            forecast: OWM_FORECAST_URL.to_string(),
            geocoding: OWM_GEOCODING_URL.to_string(),
            alerts: OWM_ALERTS_URL.to_string(),
            ip_geolocation: IP_GEOLOCATION_URL.to_string(),
        }
    }
}

/// Response cache tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum age of a cached response before it is refetched
    pub freshness: Duration,
    /// Per-request network timeout
    pub request_timeout: Duration,
    /// Maximum number of distinct request keys kept in memory
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(DEFAULT_FRESHNESS_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_entries: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Location and retention bound of the history document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySettings {
    pub path: PathBuf,
    pub max_entries_per_location: usize,
}

impl HistorySettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_entries_per_location: DEFAULT_HISTORY_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries_per_location: usize) -> Self {
        self.max_entries_per_location = max_entries_per_location;
        self
    }

    /// `<data dir>/nimbus/weather_history.json`, falling back to the working directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nimbus")
            .join("weather_history.json")
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}
