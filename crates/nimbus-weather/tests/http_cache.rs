//! Integration tests for HttpCache using wiremock.
//!
//! These tests verify freshness, stale fallback, per-key exclusion and key canonicalization
//! against a mock HTTP server.

use std::time::Duration;

use nimbus_weather::{CacheSettings, FetchError, HttpCache};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(freshness: Duration) -> CacheSettings {
    CacheSettings {
        freshness,
        request_timeout: Duration::from_secs(5),
        max_entries: 64,
    }
}

#[tokio::test]
async fn test_second_request_within_window_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .and(query_param("q", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 18 })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let endpoint = format!("{}/w", server.uri());

    let first = cache.request(&endpoint, [("q", "Paris")]).await.unwrap();
    let second = cache.request(&endpoint, [("q", "Paris")]).await.unwrap();

    assert_eq!(first, json!({ "temp": 18 }));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_parameter_order_hits_same_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let endpoint = format!("{}/w", server.uri());

    cache.request(&endpoint, [("a", 1), ("b", 2)]).await.unwrap();
    cache.request(&endpoint, [("b", 2), ("a", 1)]).await.unwrap();
}

#[tokio::test]
async fn test_distinct_params_are_distinct_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let endpoint = format!("{}/w", server.uri());

    cache.request(&endpoint, [("q", "Paris")]).await.unwrap();
    cache.request(&endpoint, [("q", "Rome")]).await.unwrap();
}

#[tokio::test]
async fn test_stale_entry_is_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "v": 1 })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "v": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::ZERO)).unwrap();
    let endpoint = format!("{}/w", server.uri());

    assert_eq!(cache.request(&endpoint, [("q", "Paris")]).await.unwrap(), json!({ "v": 1 }));
    assert_eq!(cache.request(&endpoint, [("q", "Paris")]).await.unwrap(), json!({ "v": 2 }));
}

#[tokio::test]
async fn test_failure_falls_back_to_stale_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 18 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::ZERO)).unwrap();
    let endpoint = format!("{}/w", server.uri());

    cache.request(&endpoint, [("q", "Paris")]).await.unwrap();
    let fallback = cache.request(&endpoint, [("q", "Paris")]).await.unwrap();

    assert_eq!(fallback, json!({ "temp": 18 }));
}

#[tokio::test]
async fn test_failure_without_entry_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "cod": "404", "message": "city not found" })),
        )
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let endpoint = format!("{}/w", server.uri());

    let err = cache.request(&endpoint, [("q", "Atlantis")]).await.unwrap_err();
    match err {
        FetchError::Status { status, message, .. } => {
            assert_eq!(status, 404);
            assert_eq!(message, "city not found");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_request_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 5 })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let endpoint = format!("{}/w", server.uri());

    assert!(cache.request(&endpoint, [("q", "Oslo")]).await.is_err());
    assert_eq!(cache.request(&endpoint, [("q", "Oslo")]).await.unwrap(), json!({ "temp": 5 }));
}

#[tokio::test]
async fn test_timeout_without_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let cache = HttpCache::new(CacheSettings {
        freshness: Duration::from_secs(600),
        request_timeout: Duration::from_millis(100),
        max_entries: 8,
    })
    .unwrap();

    let err = cache
        .request(&format!("{}/slow", server.uri()), [("q", "Paris")])
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_invalid_json_without_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let err = cache
        .request(&format!("{}/w", server.uri()), [("q", "Paris")])
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidResponse { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_invalidate_all_forces_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let endpoint = format!("{}/w", server.uri());

    cache.request(&endpoint, [("q", "Paris")]).await.unwrap();
    cache.invalidate_all();
    cache.request(&endpoint, [("q", "Paris")]).await.unwrap();
}

#[tokio::test]
async fn test_timeout_falls_back_to_stale_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 12 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "temp": 99 }))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let cache = HttpCache::new(CacheSettings {
        freshness: Duration::ZERO,
        request_timeout: Duration::from_millis(100),
        max_entries: 8,
    })
    .unwrap();
    let endpoint = format!("{}/w", server.uri());

    cache.request(&endpoint, [("q", "Paris")]).await.unwrap();
    let fallback = cache.request(&endpoint, [("q", "Paris")]).await.unwrap();

    assert_eq!(fallback, json!({ "temp": 12 }));
}

#[tokio::test]
async fn test_unreachable_server_falls_back_to_stale_entry() {
    let server = MockServer::builder().start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 7 })))
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::ZERO)).unwrap();
    let endpoint = format!("{}/w", server.uri());
    cache.request(&endpoint, [("q", "Oslo")]).await.unwrap();

    drop(server);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let fallback = cache.request(&endpoint, [("q", "Oslo")]).await.unwrap();
    assert_eq!(fallback, json!({ "temp": 7 }));
}

#[tokio::test]
async fn test_unreachable_server_without_entry_is_transport_error() {
    let server = MockServer::builder().start().await;
    let endpoint = format!("{}/w", server.uri());
    drop(server);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let err = cache.request(&endpoint, [("q", "Oslo")]).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_concurrent_requests_for_same_key_fetch_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "temp": 18 }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = HttpCache::new(settings(Duration::from_secs(600))).unwrap();
    let endpoint = format!("{}/w", server.uri());

    let (first, second) = tokio::join!(
        cache.request(&endpoint, [("q", "Paris"), ("units", "metric")]),
        cache.request(&endpoint, [("units", "metric"), ("q", "Paris")]),
    );

    assert_eq!(first.unwrap(), json!({ "temp": 18 }));
    assert_eq!(second.unwrap(), json!({ "temp": 18 }));
}

#[tokio::test]
async fn test_capacity_bounds_tracked_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let cache = HttpCache::new(CacheSettings {
        freshness: Duration::from_secs(600),
        request_timeout: Duration::from_secs(5),
        max_entries: 2,
    })
    .unwrap();
    let endpoint = format!("{}/w", server.uri());

    for city in ["Paris", "Rome", "Oslo", "Lima", "Kyiv"] {
        let payload = cache.request(&endpoint, [("q", city)]).await.unwrap();
        assert_eq!(payload, json!({ "ok": true }));
    }

    assert!(cache.entry_count().await <= 2);
}
