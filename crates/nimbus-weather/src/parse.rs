//! Conversion of OpenWeatherMap payloads into snapshots, forecasts and alerts.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{ForecastEntry, WeatherAlert, WeatherSnapshot};

#[derive(Debug, Default, Deserialize)]
struct OwmMain {
    #[serde(default)]
    temp: f64,
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    pressure: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwmCondition {
    id: Option<i64>,
    main: Option<String>,
    description: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwmSys {
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    name: Option<String>,
    #[serde(default)]
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: OwmWind,
    visibility: Option<f64>,
    dt: Option<i64>,
    timezone: Option<i32>,
    #[serde(default)]
    sys: OwmSys,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt: i64,
    #[serde(default)]
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: OwmWind,
    visibility: Option<f64>,
    /// Probability of precipitation, 0.0 to 1.0
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmCity {
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    #[serde(default)]
    list: Vec<OwmForecastItem>,
    city: Option<OwmCity>,
}

#[derive(Debug, Deserialize)]
struct OwmAlert {
    #[serde(default)]
    sender_name: String,
    #[serde(default)]
    event: String,
    start: Option<i64>,
    end: Option<i64>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Current conditions as reported by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub snapshot: WeatherSnapshot,
    pub place_name: Option<String>,
    pub utc_offset_secs: Option<i32>,
}

/// 3-hourly forecast as reported by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub entries: Vec<ForecastEntry>,
    pub utc_offset_secs: Option<i32>,
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn snapshot(
    main: &OwmMain,
    condition: Option<&OwmCondition>,
    wind: &OwmWind,
    visibility: Option<f64>,
    provider: &str,
    mut metadata: Map<String, Value>,
) -> WeatherSnapshot {
    if let Some(id) = condition.and_then(|c| c.id) {
        metadata.insert("condition_id".to_string(), Value::from(id));
    }
    if let Some(group) = condition.and_then(|c| c.main.clone()) {
        metadata.insert("condition_group".to_string(), Value::from(group));
    }
    if let Some(feels_like) = main.feels_like {
        metadata.insert("feels_like".to_string(), Value::from(feels_like));
    }

    WeatherSnapshot {
        temperature: main.temp,
        condition: condition
            .and_then(|c| c.description.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        humidity: main.humidity,
        wind_speed: wind.speed,
        wind_direction: wind.deg,
        pressure: main.pressure,
        visibility,
        icon: condition
            .and_then(|c| c.icon.clone())
            .filter(|icon| !icon.is_empty()),
        provider: provider.to_string(),
        metadata,
    }
}

/// Parse a current-conditions payload.
pub fn current_conditions(
    payload: &Value,
    provider: &str,
) -> Result<CurrentConditions, serde_json::Error> {
    let raw = OwmCurrent::deserialize(payload)?;

    let mut metadata = Map::new();
    let instants = [
        ("observed_at", raw.dt),
        ("sunrise", raw.sys.sunrise),
        ("sunset", raw.sys.sunset),
    ];
    for (name, secs) in instants {
        if let Some(at) = secs.and_then(timestamp) {
            metadata.insert(name.to_string(), Value::from(at.to_rfc3339()));
        }
    }

    Ok(CurrentConditions {
        snapshot: snapshot(
            &raw.main,
            raw.weather.first(),
            &raw.wind,
            raw.visibility,
            provider,
            metadata,
        ),
        place_name: raw.name.filter(|n| !n.is_empty()),
        utc_offset_secs: raw.timezone,
    })
}

/// Parse a forecast payload. Slots with an out-of-range timestamp are dropped.
pub fn forecast(payload: &Value, provider: &str) -> Result<Forecast, serde_json::Error> {
    let raw = OwmForecast::deserialize(payload)?;

    let entries = raw
        .list
        .iter()
        .filter_map(|item| {
            let time = timestamp(item.dt)?;
            let mut metadata = Map::new();
            if let Some(pop) = item.pop {
                let chance = (pop * 100.0).round().clamp(0.0, 100.0);
                metadata.insert("precipitation_chance".to_string(), Value::from(chance));
            }
            Some(ForecastEntry {
                time,
                snapshot: snapshot(
                    &item.main,
                    item.weather.first(),
                    &item.wind,
                    item.visibility,
                    provider,
                    metadata,
                ),
            })
        })
        .collect();

    Ok(Forecast {
        entries,
        utc_offset_secs: raw.city.and_then(|c| c.timezone),
    })
}

/// Alerts from a one-call payload. Individual malformed alerts are skipped.
pub fn alerts(payload: &Value) -> Vec<WeatherAlert> {
    let Some(list) = payload.get("alerts").and_then(Value::as_array) else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|value| match OwmAlert::deserialize(value) {
            Ok(alert) => Some(WeatherAlert {
                sender_name: alert.sender_name,
                event: alert.event,
                start: alert.start.and_then(timestamp),
                end: alert.end.and_then(timestamp),
                description: alert.description,
                tags: alert.tags,
            }),
            Err(e) => {
                tracing::debug!("Skipping malformed alert: {}", e);
                None
            }
        })
        .collect()
}
