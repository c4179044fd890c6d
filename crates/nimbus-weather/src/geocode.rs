//! Forward geocoding: resolve a place query to coordinates.
//! Uses the provider's direct geocoding endpoint, limited to one match.

use serde::Deserialize;
use serde_json::Value;

use crate::types::GeoPoint;

#[derive(Debug, Deserialize)]
struct DirectMatch {
    name: String,
    lat: f64,
    lon: f64,
    country: Option<String>,
    state: Option<String>,
}

/// First match of a direct-geocoding payload (a JSON array).
/// Returns `Ok(None)` when the provider found nothing.
pub fn first_match(payload: &Value) -> Result<Option<GeoPoint>, serde_json::Error> {
    let matches = Vec::<DirectMatch>::deserialize(payload)?;

    Ok(matches.into_iter().next().map(|m| GeoPoint {
        name: m.name,
        latitude: m.lat,
        longitude: m.lon,
        country: m.country.filter(|c| !c.is_empty()),
        state: m.state.filter(|s| !s.is_empty()),
    }))
}

impl GeoPoint {
    /// Human-readable place name (e.g. "Springfield, Illinois").
    pub fn display_name(&self) -> String {
        // Add state/country for disambiguation when different from place
        let suffix = self
            .state
            .as_deref()
            .filter(|s| *s != self.name)
            .or_else(|| self.country.as_deref().filter(|c| *c != self.name));

        match suffix {
            Some(s) => format!("{}, {}", self.name, s),
            None => self.name.clone(),
        }
    }
}
