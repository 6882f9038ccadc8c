//! JWKS fetching and caching.
//!
//! Owns the signing-key set: lazily fetched on first use, refreshed when
//! older than the configured TTL or when a token names an unknown `kid`.
//! Concurrent refresh triggers collapse into a single in-flight fetch.

use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::AuthError;

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
    generation: u64,
}

/// TTL-cached view of a remote JWKS endpoint.
pub(crate) struct KeyStore {
    client: reqwest::Client,
    url: String,
    ttl: Duration,
    cached: RwLock<Option<CachedKeys>>,
    refresh_lock: Mutex<()>,
}

impl KeyStore {
    pub(crate) fn new(client: reqwest::Client, url: String, ttl: Duration) -> Self {
        Self {
            client,
            url,
            ttl,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Resolve the decoding key for `kid`, refreshing the key set when it
    /// is stale or the `kid` is unknown. At most one miss-triggered
    /// refresh happens per call.
    pub(crate) async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let mut refreshed = false;
        if self.is_stale().await {
            self.refresh().await?;
            refreshed = true;
        }

        if let Some(key) = self.lookup(kid).await {
            return Ok(key);
        }

        // Unknown kid: the provider may have rotated keys since the last
        // fetch, so refresh once and retry the lookup.
        if !refreshed {
            self.refresh().await?;
            if let Some(key) = self.lookup(kid).await {
                return Ok(key);
            }
        }

        Err(AuthError::UnknownSigningKey { kid: kid.into() })
    }

    async fn is_stale(&self) -> bool {
        match self.cached.read().await.as_ref() {
            Some(cached) => cached.fetched_at.elapsed() >= self.ttl,
            None => true,
        }
    }

    async fn generation(&self) -> Option<u64> {
        self.cached.read().await.as_ref().map(|c| c.generation)
    }

    async fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        let cached = self.cached.read().await;
        let jwk = cached.as_ref()?.keys.find(kid)?;
        match DecodingKey::from_jwk(jwk) {
            Ok(key) => Some(key),
            Err(err) => {
                // Treat an unusable key entry the same as a missing one.
                debug!(kid, error = %err, "JWK for kid cannot be used for verification");
                None
            }
        }
    }

    /// Replace the cached key set with a freshly fetched one.
    ///
    /// Single-flight: callers that waited on the lock while another
    /// refresh completed observe the bumped generation and skip their own
    /// fetch. A failed fetch keeps a pre-existing (stale) key set in
    /// place (fail-open, with a warning) and is fatal only when no key
    /// set has ever been fetched.
    async fn refresh(&self) -> Result<(), AuthError> {
        let observed = self.generation().await;
        let _guard = self.refresh_lock.lock().await;
        if self.generation().await != observed {
            return Ok(());
        }

        match self.fetch().await {
            Ok(keys) => {
                debug!(url = %self.url, count = keys.keys.len(), "refreshed JWKS");
                *self.cached.write().await = Some(CachedKeys {
                    keys,
                    fetched_at: Instant::now(),
                    generation: observed.map_or(1, |g| g + 1),
                });
                Ok(())
            }
            Err(err) => {
                if self.cached.read().await.is_some() {
                    warn!(url = %self.url, error = %err, "JWKS refresh failed, continuing with stale key set");
                    Ok(())
                } else {
                    Err(AuthError::KeySetUnavailable(err))
                }
            }
        }
    }

    async fn fetch(&self) -> Result<JwkSet, reqwest::Error> {
        let resp = self.client.get(&self.url).send().await?.error_for_status()?;
        resp.json::<JwkSet>().await
    }
}
