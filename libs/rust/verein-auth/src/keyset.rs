//! Provider key-set cache with single-flight refresh.
//!
//! Caches the identity provider's published verification keys by key-id.
//! A snapshot is fresh for the configured TTL; misses and stale hits trigger
//! a refetch that is bounded to the configured per-minute budget, with
//! concurrent callers coalescing onto one upstream request. When a refetch
//! fails or is over budget, already-cached key-ids may still be served
//! stale, but a key-id the provider never published fails closed.

use crate::config::AuthConfig;
use crate::error::AuthError;
use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use jsonwebtoken::DecodingKey;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One published key, as served by the key-set endpoint.
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kty: String,
    kid: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
    #[serde(default)]
    crv: Option<String>,
}

/// Wire shape of the key-set endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct KeySet {
    keys: Vec<Jwk>,
}

/// Immutable view of the key set at one fetch instant.
struct KeySnapshot {
    keys: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
}

impl KeySnapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Failure of an upstream fetch, cloneable so coalesced waiters all see it.
#[derive(Debug, Clone)]
enum FetchFailure {
    Timeout(String),
    Failed(String),
}

impl From<FetchFailure> for AuthError {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Timeout(msg) => Self::Timeout(msg),
            FetchFailure::Failed(msg) => Self::Upstream(msg),
        }
    }
}

type InflightFetch = Shared<BoxFuture<'static, Result<Arc<KeySnapshot>, FetchFailure>>>;

/// Cache of the provider's verification keys, keyed by key-id.
pub struct KeySetCache {
    jwks_url: url::Url,
    http: reqwest::Client,
    ttl: Duration,
    min_refresh_interval: Duration,
    current: ArcSwapOption<KeySnapshot>,
    inflight: Mutex<Option<InflightFetch>>,
    last_fetch: Mutex<Option<Instant>>,
}

impl KeySetCache {
    /// Create a cache for the configured key-set endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AuthError::internal(format!("http client: {e}")))?;

        Ok(Self {
            jwks_url: config.jwks_url.clone(),
            http,
            ttl: config.keys_ttl,
            min_refresh_interval: config.min_refresh_interval(),
            current: ArcSwapOption::empty(),
            inflight: Mutex::new(None),
            last_fetch: Mutex::new(None),
        })
    }

    /// Resolve a verification key by key-id.
    ///
    /// Serves a fresh cache hit directly; otherwise refreshes (within the
    /// rate budget, coalescing with concurrent callers) and resolves against
    /// the fresh set. A key-id absent from the fresh set is
    /// [`AuthError::KeyNotFound`] — never a fallback to another key.
    ///
    /// # Errors
    ///
    /// [`AuthError::KeyNotFound`] for unknown key-ids, or an upstream error
    /// when the fetch fails and the key-id was never cached.
    pub async fn get_key(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        let snapshot = self.current.load_full();

        if let Some(ref snap) = snapshot {
            if snap.is_fresh(self.ttl) {
                if let Some(key) = snap.keys.get(kid) {
                    return Ok(Arc::clone(key));
                }
            }
        }

        match self.refresh().await {
            Ok(fresh) => fresh
                .keys
                .get(kid)
                .map(Arc::clone)
                .ok_or_else(|| AuthError::KeyNotFound {
                    kid: kid.to_string(),
                }),
            Err(err) => {
                // A known key-id may be served stale; an unknown one fails
                // closed regardless of why the refresh did not happen.
                if let Some(ref snap) = snapshot {
                    if let Some(key) = snap.keys.get(kid) {
                        warn!(kid = %kid, error = %err, "serving stale key after failed refresh");
                        return Ok(Arc::clone(key));
                    }
                }
                if matches!(err, AuthError::RateLimited(_)) {
                    return Err(AuthError::KeyNotFound {
                        kid: kid.to_string(),
                    });
                }
                Err(err)
            }
        }
    }

    /// Fetch the key set once at startup, logging instead of failing.
    pub async fn warm(&self) {
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "initial key-set fetch failed; will retry on demand");
        }
    }

    /// Whether the cached snapshot is missing or older than its TTL.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.current
            .load_full()
            .map_or(true, |snap| !snap.is_fresh(self.ttl))
    }

    /// Number of key-ids in the current snapshot.
    #[must_use]
    pub fn cached_key_count(&self) -> usize {
        self.current.load_full().map_or(0, |snap| snap.keys.len())
    }

    /// Refresh the snapshot, joining any fetch already in flight.
    ///
    /// Starting a new upstream fetch consumes refresh budget; joining an
    /// in-flight one does not. The budget stamp is recorded before the fetch
    /// begins, so failed fetches count against it too.
    async fn refresh(&self) -> Result<Arc<KeySnapshot>, AuthError> {
        let fut = {
            let mut inflight = self.inflight.lock();
            if let Some(fut) = inflight.as_ref() {
                fut.clone()
            } else {
                {
                    let mut last = self.last_fetch.lock();
                    if let Some(at) = *last {
                        if at.elapsed() < self.min_refresh_interval {
                            return Err(AuthError::rate_limited(
                                "key-set refresh budget exhausted",
                            ));
                        }
                    }
                    *last = Some(Instant::now());
                }
                let fut = fetch_key_set(self.http.clone(), self.jwks_url.clone())
                    .boxed()
                    .shared();
                *inflight = Some(fut.clone());
                fut
            }
        };

        let result = fut.clone().await;
        {
            // Only clear our own fetch; a newer one may already be in the slot.
            let mut inflight = self.inflight.lock();
            if inflight.as_ref().is_some_and(|current| current.ptr_eq(&fut)) {
                *inflight = None;
            }
        }

        match result {
            Ok(snapshot) => {
                self.current.store(Some(Arc::clone(&snapshot)));
                Ok(snapshot)
            }
            Err(failure) => Err(failure.into()),
        }
    }
}

/// Fetch and index the published key set.
async fn fetch_key_set(
    client: reqwest::Client,
    url: url::Url,
) -> Result<Arc<KeySnapshot>, FetchFailure> {
    debug!(url = %url, "fetching provider key set");

    let response = client.get(url).send().await.map_err(classify_fetch_error)?;
    if !response.status().is_success() {
        return Err(FetchFailure::Failed(format!(
            "key-set endpoint returned {}",
            response.status()
        )));
    }

    let key_set: KeySet = response.json().await.map_err(classify_fetch_error)?;

    let mut keys = HashMap::new();
    for jwk in &key_set.keys {
        if let Some(key) = decoding_key_for(jwk) {
            keys.insert(jwk.kid.clone(), Arc::new(key));
        }
    }

    info!(count = keys.len(), "provider key set refreshed");
    Ok(Arc::new(KeySnapshot {
        keys,
        fetched_at: Instant::now(),
    }))
}

fn classify_fetch_error(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout(err.to_string())
    } else {
        FetchFailure::Failed(err.to_string())
    }
}

/// Convert a published key to a verification key, rejecting weak material.
fn decoding_key_for(jwk: &Jwk) -> Option<DecodingKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref()?;
            let e = jwk.e.as_ref()?;

            // 2048-bit modulus is ~342 base64url chars; anything shorter is
            // below the accepted minimum.
            if n.len() < 340 {
                warn!(kid = %jwk.kid, "rejecting undersized RSA key");
                return None;
            }

            DecodingKey::from_rsa_components(n, e).ok()
        }
        "EC" => {
            let x = jwk.x.as_ref()?;
            let y = jwk.y.as_ref()?;
            let crv = jwk.crv.as_deref().unwrap_or("P-256");

            if !matches!(crv, "P-256" | "P-384" | "P-521") {
                warn!(kid = %jwk.kid, crv = %crv, "rejecting weak EC curve");
                return None;
            }

            DecodingKey::from_ec_components(x, y).ok()
        }
        other => {
            warn!(kty = %other, kid = %jwk.kid, "unsupported key type in key set");
            None
        }
    }
}
