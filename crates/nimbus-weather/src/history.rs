//! Bounded per-location observation history, persisted as one JSON document.
//!
//! The whole document is held in memory and rewritten on every mutation.
//! Storage failures are logged and never surface to callers: an unreadable
//! document loads as empty history, and a failed write leaves the in-memory
//! state correct but unpersisted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HistoryLoadError, HistoryPersistError};
use crate::settings::HistorySettings;
use crate::types::WeatherSnapshot;

/// On-disk shape: location key -> entries, earliest recorded first
type Document = BTreeMap<String, Vec<HistoryEntry>>;

fn unknown_provider() -> String {
    "unknown".to_string()
}

/// One recorded observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub location: String,
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
    #[serde(default = "unknown_provider")]
    pub provider: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl HistoryEntry {
    fn new(
        location: &str,
        snapshot: &WeatherSnapshot,
        provider: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut metadata = snapshot.metadata.clone();
        metadata
            .entry("source")
            .or_insert_with(|| Value::from("api"));

        Self {
            timestamp,
            location: location.to_string(),
            temperature: finite_or_zero("temperature", snapshot.temperature),
            condition: snapshot.condition.clone(),
            humidity: finite_or_zero("humidity", snapshot.humidity),
            wind_speed: finite_or_zero("wind_speed", snapshot.wind_speed),
            wind_direction: finite_or_zero("wind_direction", snapshot.wind_direction),
            pressure: finite_or_zero("pressure", snapshot.pressure),
            visibility: snapshot.visibility.filter(|v| v.is_finite()),
            icon: snapshot.icon.clone(),
            provider: provider.to_string(),
            metadata,
        }
    }
}

/// JSON has no NaN or infinity; they would be written as `null` and fail to load.
fn finite_or_zero(field: &str, value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!("Recording non-finite {} ({}) as 0", field, value);
        0.0
    }
}

/// ISO-8601 timestamps. Written as RFC 3339 in UTC; offset-less values from
/// older documents are read as UTC.
mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Per-location bounded history backed by a JSON document.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    document: Mutex<Document>,
}

impl HistoryStore {
    /// Open the store, loading whatever history the document holds.
    pub fn open(settings: HistorySettings) -> Self {
        let document = load_or_empty(&settings.path, settings.max_entries_per_location);
        Self {
            path: settings.path,
            max_entries: settings.max_entries_per_location,
            document: Mutex::new(document),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_entries_per_location(&self) -> usize {
        self.max_entries
    }

    /// Record `snapshot` for `location`, stamped with the current time.
    ///
    /// The entry is appended, so it is always the newest one kept even if the
    /// wall clock stepped backwards. Past the retention bound the earliest
    /// added entries are dropped.
    pub fn add(&self, location: &str, snapshot: &WeatherSnapshot, provider: &str) -> HistoryEntry {
        let entry = HistoryEntry::new(location, snapshot, provider, Utc::now());
        self.insert(location, entry, |entries| entries.len())
    }

    /// Record `snapshot` with an explicit capture time (imports, backfill).
    ///
    /// The entry is placed after every entry not newer than it; past the
    /// retention bound the entries at the front are dropped.
    pub fn add_at(
        &self,
        location: &str,
        snapshot: &WeatherSnapshot,
        provider: &str,
        captured_at: DateTime<Utc>,
    ) -> HistoryEntry {
        let entry = HistoryEntry::new(location, snapshot, provider, captured_at);
        self.insert(location, entry, |entries| {
            entries.partition_point(|e| e.timestamp <= captured_at)
        })
    }

    fn insert(
        &self,
        location: &str,
        entry: HistoryEntry,
        position: impl FnOnce(&[HistoryEntry]) -> usize,
    ) -> HistoryEntry {
        let mut document = self.document.lock();
        let entries = document.entry(location.to_string()).or_default();
        let at = position(entries.as_slice());
        entries.insert(at, entry.clone());
        trim_to(entries, self.max_entries);

        tracing::debug!("Recorded {} observation ({} kept)", location, entries.len());
        self.persist_logged(&document);
        entry
    }

    /// History for `location`, most recent first.
    ///
    /// With `days_back > 0` only entries from the last `days_back` days are
    /// returned; zero or negative disables the date filter. `limit` keeps the
    /// most recent `limit` entries after date filtering (`None` or 0: no limit).
    pub fn get_history(
        &self,
        location: &str,
        days_back: i64,
        limit: Option<usize>,
    ) -> Vec<HistoryEntry> {
        let document = self.document.lock();
        let Some(entries) = document.get(location) else {
            return Vec::new();
        };

        let cutoff = if days_back > 0 {
            Duration::try_days(days_back).and_then(|span| Utc::now().checked_sub_signed(span))
        } else {
            None
        };

        let mut history: Vec<HistoryEntry> = entries
            .iter()
            .filter(|e| cutoff.map_or(true, |cutoff| e.timestamp >= cutoff))
            .cloned()
            .collect();

        if let Some(limit) = limit.filter(|l| *l > 0) {
            trim_to(&mut history, limit);
        }

        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history
    }

    /// Remove history for one location, or for every location when `None`.
    pub fn clear(&self, location: Option<&str>) {
        let mut document = self.document.lock();
        match location {
            Some(location) => {
                document.remove(location);
            }
            None => document.clear(),
        }
        self.persist_logged(&document);
        tracing::info!("Cleared weather history for location: {}", location.unwrap_or("all"));
    }

    /// Locations with recorded history, in key order
    pub fn get_locations(&self) -> Vec<String> {
        self.document.lock().keys().cloned().collect()
    }

    /// Number of entries kept for `location`
    pub fn len(&self, location: &str) -> usize {
        self.document.lock().get(location).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.document.lock().values().all(Vec::is_empty)
    }

    /// Replace the in-memory state with the document on disk.
    pub fn reload(&self) {
        let mut document = self.document.lock();
        *document = load_or_empty(&self.path, self.max_entries);
    }

    fn persist_logged(&self, document: &Document) {
        if let Err(e) = persist(&self.path, document) {
            tracing::error!("Error saving weather history: {}", e);
        }
    }
}

fn trim_to(entries: &mut Vec<HistoryEntry>, max: usize) {
    if entries.len() > max {
        let excess = entries.len() - max;
        entries.drain(..excess);
    }
}

fn load_or_empty(path: &Path, max_entries: usize) -> Document {
    match load(path) {
        Ok(mut document) => {
            for entries in document.values_mut() {
                trim_to(entries, max_entries);
            }
            tracing::info!("Loaded weather history for {} locations", document.len());
            document
        }
        Err(e) => {
            tracing::error!("Error loading weather history: {}", e);
            Document::new()
        }
    }
}

/// Read the document. A missing file is empty history, not an error.
fn load(path: &Path) -> Result<Document, HistoryLoadError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(source) => {
            return Err(HistoryLoadError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if contents.trim().is_empty() {
        return Ok(Document::new());
    }

    let raw: BTreeMap<String, Value> =
        serde_json::from_str(&contents).map_err(|source| HistoryLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(raw
        .into_iter()
        .filter_map(|(location, value)| {
            let entries = readable_entries(&location, value);
            (!entries.is_empty()).then_some((location, entries))
        })
        .collect())
}

/// Entries of one location that deserialize; the rest are dropped with a warning.
fn readable_entries(location: &str, value: Value) -> Vec<HistoryEntry> {
    let Value::Array(items) = value else {
        tracing::warn!("Ignoring history for {}: not a list of entries", location);
        return Vec::new();
    };

    let total = items.len();
    let entries: Vec<HistoryEntry> = items
        .into_iter()
        .filter_map(|item| match HistoryEntry::deserialize(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Unreadable {} history entry: {}", location, e);
                None
            }
        })
        .collect();

    if entries.len() < total {
        tracing::warn!(
            "Dropped {} unreadable history entries for {}",
            total - entries.len(),
            location
        );
    }
    entries
}

/// Rewrite the document through a sibling temp file so a crash mid-write
/// never leaves a truncated document behind.
fn persist(path: &Path, document: &Document) -> Result<(), HistoryPersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| HistoryPersistError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let contents = serde_json::to_vec_pretty(document)?;
    let tmp_path = path.with_extension("json.tmp");

    std::fs::write(&tmp_path, contents).map_err(|source| HistoryPersistError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| HistoryPersistError::Write {
        path: path.to_path_buf(),
        source,
    })
}
