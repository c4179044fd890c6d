//! Weather data layer for Nimbus
//!
//! Cached access to the weather provider (current conditions, forecast,
//! geocoding, alerts) and a bounded per-location observation history.

pub mod cache;
pub mod client;
pub mod error;
pub mod geocode;
pub mod history;
pub mod location;
pub mod parse;
pub mod settings;
pub mod types;

pub use cache::{CacheKey, HttpCache};
pub use client::{SharedProviderConfig, WeatherClient, PROVIDER_NAME};
pub use error::{ClientBuildError, FetchError, HistoryLoadError, HistoryPersistError, WeatherFetchError};
pub use history::{HistoryEntry, HistoryStore};
pub use settings::{CacheSettings, Endpoints, HistorySettings};
pub use types::*;
