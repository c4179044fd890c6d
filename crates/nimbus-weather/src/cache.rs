//! Response cache in front of provider calls.
//!
//! A response is served from memory while it is younger than the freshness
//! window. Past that it is refetched, and if the refetch fails the last good
//! response is returned regardless of age. Only a key that has never been
//! fetched successfully surfaces a [`FetchError`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{ClientBuildError, FetchError};
use crate::settings::CacheSettings;

/// Endpoint plus its query parameters in canonical (sorted) order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    /// Later duplicates of a parameter name replace earlier ones.
    pub fn new<I, K, V>(endpoint: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        Self {
            endpoint: endpoint.to_string(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

#[derive(Debug, Clone)]
struct CachedResponse {
    payload: Value,
    fetched_at: Instant,
}

/// Per-key slot. Holding its lock serializes check, fetch and store for that key.
type Slot = Arc<Mutex<Option<CachedResponse>>>;

/// HTTP GET with a bounded, time-boxed response cache and stale fallback.
#[derive(Clone)]
pub struct HttpCache {
    client: Client,
    slots: Cache<CacheKey, Slot>,
    freshness: Duration,
}

impl HttpCache {
    pub fn new(settings: CacheSettings) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("nimbus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            slots: Cache::builder().max_capacity(settings.max_entries).build(),
            freshness: settings.freshness,
        })
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// GET `endpoint` with `params`, going through the cache.
    #[instrument(skip(self, params), level = "debug")]
    pub async fn request<I, K, V>(&self, endpoint: &str, params: I) -> Result<Value, FetchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let key = CacheKey::new(endpoint, params);
        let slot = self
            .slots
            .get_with(key.clone(), async { Arc::new(Mutex::new(None)) })
            .await;
        let mut cached = slot.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.freshness {
                tracing::debug!("Cache hit for {}", endpoint);
                return Ok(entry.payload.clone());
            }
        }

        match self.fetch(&key).await {
            Ok(payload) => {
                *cached = Some(CachedResponse {
                    payload: payload.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(payload)
            }
            Err(e) => match cached.as_ref() {
                Some(stale) => {
                    tracing::warn!(
                        "Request to {} failed ({}), using cached data from {:?} ago",
                        endpoint,
                        e,
                        stale.fetched_at.elapsed()
                    );
                    Ok(stale.payload.clone())
                }
                None => {
                    tracing::error!("Request to {} failed with no cached data: {}", endpoint, e);
                    Err(e)
                }
            },
        }
    }

    /// Drop every cached response. The next request for any key goes to the network.
    pub fn invalidate_all(&self) {
        self.slots.invalidate_all();
    }

    /// Number of request keys currently tracked
    pub async fn entry_count(&self) -> u64 {
        self.slots.run_pending_tasks().await;
        self.slots.entry_count()
    }

    async fn fetch(&self, key: &CacheKey) -> Result<Value, FetchError> {
        let endpoint = key.endpoint();
        let response = self
            .client
            .get(endpoint)
            .query(key.params())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = provider_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "API error".to_string());
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::from_reqwest(endpoint, &e))
    }
}

impl std::fmt::Debug for HttpCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCache")
            .field("freshness", &self.freshness)
            .field("tracked_keys", &self.slots.entry_count())
            .finish()
    }
}

/// Error text from a provider error body such as `{"cod":"404","message":"city not found"}`
fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_parameter_order() {
        let a = CacheKey::new("w", [("a", 1), ("b", 2)]);
        let b = CacheKey::new("w", [("b", 2), ("a", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinguishes_endpoint_and_values() {
        let base = CacheKey::new("w", [("q", "Paris")]);
        assert_ne!(base, CacheKey::new("f", [("q", "Paris")]));
        assert_ne!(base, CacheKey::new("w", [("q", "Rome")]));
    }

    #[test]
    fn test_key_last_duplicate_wins() {
        let key = CacheKey::new("w", [("q", "Paris"), ("q", "Rome")]);
        assert_eq!(key.params().get("q").map(String::as_str), Some("Rome"));
        assert_eq!(key.params().len(), 1);
    }

    #[test]
    fn test_provider_message() {
        assert_eq!(
            provider_message(r#"{"cod":"404","message":"city not found"}"#).as_deref(),
            Some("city not found")
        );
        assert_eq!(provider_message("<html>bad gateway</html>"), None);
        assert_eq!(provider_message(r#"{"message":""}"#), None);
    }
}
