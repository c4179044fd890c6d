use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Unit system requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    /// Value of the `units` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    pub fn speed_unit(&self) -> &'static str {
        match self {
            Self::Metric => "m/s",
            Self::Imperial => "mph",
        }
    }
}

impl std::str::FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(format!("unknown unit system: {}", other)),
        }
    }
}

/// Credential, unit system and language sent with every provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    pub units: Units,
    pub language: String,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, units: Units, language: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            units,
            language: language.into(),
        }
    }

    /// Check if an API key is set (not empty or a placeholder)
    pub fn has_credential(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && !key.starts_with("YOUR_")
    }

    /// Apply the fields present in `update`, leaving the rest unchanged.
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(api_key) = update.api_key {
            self.api_key = api_key;
        }
        if let Some(units) = update.units {
            self.units = units;
        }
        if let Some(language) = update.language {
            self.language = language;
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            units: Units::Metric,
            language: "en".to_string(),
        }
    }
}

/// Partial update of a [`ProviderConfig`]. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub api_key: Option<String>,
    pub units: Option<Units>,
    pub language: Option<String>,
}

impl ConfigUpdate {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.units.is_none() && self.language.is_none()
    }
}

/// Weather condition categories mapped from provider condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_code(code: i64) -> Self {
        match code {
            200..=232 => Self::Thunderstorm,
            300..=321 => Self::Drizzle,
            502..=504 | 522 => Self::HeavyRain,
            511 => Self::Sleet, // Freezing rain
            500..=531 => Self::Rain,
            611..=616 => Self::Sleet,
            600..=622 => Self::Snow,
            771 | 781 => Self::Thunderstorm, // Squalls, tornado
            701..=762 => Self::Fog,
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Short lowercase label for terminal output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly cloudy",
            Self::Cloudy => "overcast",
            Self::Fog => "fog or haze",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::HeavyRain => "heavy rain",
            Self::Snow => "snow",
            Self::Sleet => "sleet or freezing rain",
            Self::Thunderstorm => "storm",
        }
    }
}

/// Point-in-time observation for a location.
///
/// Built by the weather client from a provider response, or from a raw
/// mapping through [`WeatherSnapshot::from_map`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub condition: String,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub pressure: f64,
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub icon: Option<String>,
    pub provider: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl WeatherSnapshot {
    /// Normalize a loosely-shaped mapping (manual entry, plugin output) into a snapshot.
    ///
    /// Missing numeric fields become 0, a missing condition becomes "unknown",
    /// and `metadata.source` is set to "manual" unless the mapping supplies one.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let number = |key: &str| map.get(key).and_then(Value::as_f64).unwrap_or(0.0);

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::from("manual"));
        if let Some(Value::Object(extra)) = map.get("metadata") {
            metadata.extend(extra.clone());
        }

        Self {
            temperature: number("temperature"),
            condition: map
                .get("condition")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            humidity: number("humidity"),
            wind_speed: number("wind_speed"),
            wind_direction: number("wind_direction"),
            pressure: number("pressure"),
            visibility: map.get("visibility").and_then(Value::as_f64),
            icon: map.get("icon").and_then(Value::as_str).map(str::to_string),
            provider: map
                .get("provider")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            metadata,
        }
    }

    /// Condition category derived from the provider's condition id, if present
    pub fn condition_kind(&self) -> Option<WeatherCondition> {
        self.metadata
            .get("condition_id")
            .and_then(Value::as_i64)
            .map(WeatherCondition::from_owm_code)
    }

    /// URL of the provider's rendering of the icon
    pub fn icon_url(&self) -> Option<String> {
        self.icon
            .as_deref()
            .filter(|code| !code.is_empty())
            .map(|code| format!("{}/{}@2x.png", ICON_BASE_URL, code))
    }
}

/// One 3-hourly forecast slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub snapshot: WeatherSnapshot,
}

/// Current conditions plus forecast for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Location as requested by the caller
    pub location: String,
    /// Place name reported by the provider
    pub resolved_name: Option<String>,
    pub units: Units,
    /// Offset of the location's local time from UTC, in seconds
    pub utc_offset_secs: i32,
    pub current: WeatherSnapshot,
    pub forecast: Vec<ForecastEntry>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherReport {
    /// One forecast slot per local calendar day, the one closest to local noon,
    /// for at most `days` days.
    pub fn daily_forecast(&self, days: usize) -> Vec<(NaiveDate, &ForecastEntry)> {
        let offset = Duration::seconds(i64::from(self.utc_offset_secs));
        let mut daily: Vec<(NaiveDate, &ForecastEntry, u32)> = Vec::new();

        for entry in &self.forecast {
            let local = entry.time + offset;
            let date = local.date_naive();
            let distance = local.hour().abs_diff(12);

            match daily.iter_mut().find(|(d, _, _)| *d == date) {
                Some(slot) if distance < slot.2 => *slot = (date, entry, distance),
                Some(_) => {}
                None => daily.push((date, entry, distance)),
            }
        }

        daily.sort_by_key(|(date, _, _)| *date);
        daily
            .into_iter()
            .take(days)
            .map(|(date, entry, _)| (date, entry))
            .collect()
    }
}

/// Geocoding match for a location query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: Option<String>,
    pub state: Option<String>,
}

/// Severe weather alert issued for a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub sender_name: String,
    pub event: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub description: String,
    pub tags: Vec<String>,
}

impl WeatherAlert {
    /// Whether the alert covers the given instant
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        let started = self.start.map_or(true, |start| start <= at);
        let not_ended = self.end.map_or(true, |end| at < end);
        started && not_ended
    }
}
