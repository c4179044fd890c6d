//! Current location detection from the public IP address.
//! Uses an ipinfo-style endpoint - no API key required.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    country: Option<String>,
}

/// Detect the city of the current public IP (e.g. "Milan, IT").
/// Returns `None` on failure or timeout; the caller can ask the user instead.
pub async fn detect_city(endpoint: &str, timeout: Duration) -> Option<String> {
    let client = match Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to create geolocation client: {}", e);
            return None;
        }
    };

    let response = match client.get(endpoint).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("Geolocation request failed: {}", e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!("Geolocation returned status {}", response.status());
        return None;
    }

    let body: IpInfoResponse = match response.json().await {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!("Geolocation parse error: {}", e);
            return None;
        }
    };

    let city = body.city.filter(|c| !c.trim().is_empty())?;
    let result = match body.country.filter(|c| !c.is_empty()) {
        Some(country) => format!("{}, {}", city, country),
        None => city,
    };

    tracing::info!("Detected location: {}", result);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_detect_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ip": "203.0.113.7",
                "city": "Milan",
                "region": "Lombardy",
                "country": "IT"
            })))
            .mount(&server)
            .await;

        let city = detect_city(&format!("{}/json", server.uri()), Duration::from_secs(5)).await;
        assert_eq!(city.as_deref(), Some("Milan, IT"));
    }

    #[tokio::test]
    async fn test_detect_city_without_city_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ip": "203.0.113.7",
                "bogon": true
            })))
            .mount(&server)
            .await;

        let city = detect_city(&format!("{}/json", server.uri()), Duration::from_secs(5)).await;
        assert_eq!(city, None);
    }

    #[tokio::test]
    async fn test_detect_city_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let city = detect_city(&format!("{}/json", server.uri()), Duration::from_secs(5)).await;
        assert_eq!(city, None);
    }
}
