//! Behavior of the provider key-set cache: TTL, refresh budget,
//! singleflight coalescing and fail-closed resolution.

use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use verein_auth::{AuthConfig, AuthError, KeySetCache};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_BODY: &str = r#"{
  "keys": [
    {
      "kty": "RSA",
      "use": "sig",
      "alg": "RS256",
      "kid": "test",
      "n": "wsO5rqxMEmeSY-I35D6fQ8ZoYa1dPsur6OSf8I_GNSf5N46rBq94PwG9Bd_QpY1RJvEG87nGBcZwj7PDyxqGBtKXS0kY2Ln1GqTo_JXd6JT7lnhJCcLb92e5YplVC6TgQCh09glx0r5lCp7oz-HWVX0YcGlDnHm24NUIVGDhDYggB-Zl9XuTKc33sLuhnR3ASDBoNpsPTjo0FwBVxBA9szKM3Ajl0STJQbx9codjcMAB4sqgWLoGrt1mpRxfE2aXDyv9ZiZuykb24l0TYm5BBR_VZUUSJaRQimJt8g2uH1MXd-Tw3OtUOUVe16jiHGNE-jiA05T9Gknr3Aqqs291hw",
      "e": "AQAB"
    }
  ]
}"#;

fn jwks_json() -> serde_json::Value {
    serde_json::from_str(JWKS_BODY).unwrap()
}

fn config_for(server: &MockServer) -> AuthConfig {
    AuthConfig::new(
        Url::parse("https://idp.example.org/realms/verein").unwrap(),
        Url::parse(&format!("{}/certs", server.uri())).unwrap(),
        SecretString::from("0123456789abcdef0123456789abcdef"),
        SecretString::from("internal-service-key"),
    )
}

#[tokio::test]
async fn test_fetch_and_resolve_known_kid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = KeySetCache::new(&config_for(&server)).unwrap();
    assert!(cache.is_stale());

    let key = cache.get_key("test").await;
    assert!(key.is_ok());
    assert_eq!(cache.cached_key_count(), 1);
    assert!(!cache.is_stale());

    // Second resolution is served from the fresh snapshot.
    let again = cache.get_key("test").await;
    assert!(again.is_ok());

    server.verify().await;
}

#[tokio::test]
async fn test_warm_primes_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = KeySetCache::new(&config_for(&server)).unwrap();
    cache.warm().await;
    assert_eq!(cache.cached_key_count(), 1);

    let key = cache.get_key("test").await;
    assert!(key.is_ok());

    server.verify().await;
}

#[tokio::test]
async fn test_unknown_kid_fails_closed_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = KeySetCache::new(&config_for(&server)).unwrap();

    // First miss triggers the fetch; the key-id is still absent.
    let err = cache.get_key("abc").await.err().unwrap();
    assert!(matches!(err, AuthError::KeyNotFound { .. }));

    // Immediately asking again stays within the refresh budget and must
    // not hit the endpoint a second time.
    let err = cache.get_key("abc").await.err().unwrap();
    assert!(matches!(err, AuthError::KeyNotFound { .. }));

    // The known key-id is unaffected.
    assert!(cache.get_key("test").await.is_ok());

    server.verify().await;
}

#[tokio::test]
async fn test_budget_allows_refetch_after_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server)
        .with_keys_ttl(Duration::ZERO)
        .with_keys_refresh_per_minute(60_000);
    let cache = KeySetCache::new(&config).unwrap();

    assert!(cache.get_key("test").await.is_ok());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.get_key("test").await.is_ok());

    server.verify().await;
}

#[tokio::test]
async fn test_singleflight_coalesces_concurrent_callers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(KeySetCache::new(&config_for(&server)).unwrap());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move { cache.get_key("test").await }));
    }

    for task in tasks {
        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    server.verify().await;
}

#[tokio::test]
async fn test_stale_serve_for_known_kid_on_upstream_failure() {
    let server = MockServer::start().await;
    let healthy = Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .expect(1)
        .mount_as_scoped(&server)
        .await;

    // Snapshots go stale immediately; the budget never blocks.
    let config = config_for(&server)
        .with_keys_ttl(Duration::ZERO)
        .with_keys_refresh_per_minute(60_000);
    let cache = KeySetCache::new(&config).unwrap();
    assert!(cache.get_key("test").await.is_ok());

    drop(healthy);
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The known key-id keeps working from the stale snapshot.
    assert!(cache.get_key("test").await.is_ok());

    // An unknown key-id cannot hide behind staleness.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let err = cache.get_key("abc").await.err().unwrap();
    assert!(matches!(err, AuthError::Upstream(_)));
}

#[tokio::test]
async fn test_cold_cache_upstream_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cache = KeySetCache::new(&config_for(&server)).unwrap();
    let err = cache.get_key("test").await.err().unwrap();

    assert!(matches!(err, AuthError::Upstream(_)));
    assert_eq!(err.http_status().as_u16(), 502);
}

#[tokio::test]
async fn test_malformed_key_set_body_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not a key set"))
        .mount(&server)
        .await;

    let cache = KeySetCache::new(&config_for(&server)).unwrap();
    let err = cache.get_key("test").await.err().unwrap();
    assert!(matches!(err, AuthError::Upstream(_)));
}

#[tokio::test]
async fn test_slow_endpoint_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.fetch_timeout = Duration::from_millis(50);
    let cache = KeySetCache::new(&config).unwrap();

    let err = cache.get_key("test").await.err().unwrap();
    assert!(matches!(err, AuthError::Timeout(_)));
    assert_eq!(err.http_status().as_u16(), 504);
}
