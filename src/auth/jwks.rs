//! Signing key cache backed by a remote key set.
//!
//! # Lookup Flow
//!
//! ```text
//! resolve(kid)
//!   ├─ hit  ──────────────────────────────► key
//!   └─ miss ─► refresh gate (one fetch at a time)
//!                ├─ another caller refreshed meanwhile ─► re-read
//!                └─ fetch from KeySetSource ─► publish new map ─► re-read
//! ```
//!
//! The key map is replaced wholesale: a new `HashMap` is built from the
//! fetched set and swapped in under a short write lock, so readers see
//! either the old map or the new one, never a partial update.
//!
//! Refreshes are single-flight. Each completed fetch attempt bumps a
//! generation counter; a caller that waited on the gate and sees a newer
//! generation than the one it observed before missing skips its own fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::{AuthError, KeySetError};
use crate::metrics;

/// JSON document served by the key-distribution endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

/// One entry of a [`JwkSet`]. Fields we do not read are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub kty: String,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

/// Where key sets come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Fetches the key set over HTTP with a client-side timeout.
pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Status(status.as_u16()));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySetError::Decode(e.to_string()))
    }
}

type KeyMap = HashMap<String, Arc<DecodingKey>>;

/// Cache of RSA verification keys indexed by key id.
pub struct KeyCache {
    source: Arc<dyn KeySetSource>,
    keys: RwLock<Arc<KeyMap>>,
    refresh_gate: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            keys: RwLock::new(Arc::new(HashMap::new())),
            refresh_gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Look up a cached key without touching the network.
    pub fn get_key(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        self.keys
            .read()
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached key ids, sorted.
    pub fn key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Fetch the key set and replace the cache contents.
    ///
    /// Returns the number of usable keys. On failure the previous contents
    /// stay in place.
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Resolve a key, refreshing once on a miss.
    ///
    /// Concurrent misses share one fetch.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        // Read the generation before the lookup so a refresh that lands
        // in between is not repeated
        let observed = self.generation.load(Ordering::Acquire);
        if let Ok(key) = self.get_key(kid) {
            return Ok(key);
        }

        {
            let _gate = self.refresh_gate.lock().await;
            if self.generation.load(Ordering::Acquire) == observed {
                debug!(kid, "Signing key not cached, refreshing key set");
                self.refresh_locked().await?;
            } else {
                debug!(kid, "Key set refreshed by a concurrent request");
            }
        }

        self.get_key(kid)
    }

    async fn refresh_locked(&self) -> Result<usize, KeySetError> {
        let fetched = self.source.fetch().await;
        self.generation.fetch_add(1, Ordering::AcqRel);

        let set = match fetched {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "Failed to refresh signing keys");
                metrics::record_key_refresh(false);
                return Err(e);
            }
        };

        let keys = parse_key_set(&set);
        let count = keys.len();
        *self.keys.write() = Arc::new(keys);

        metrics::record_key_refresh(true);
        metrics::set_signing_keys(count);
        info!(key_count = count, "Signing keys refreshed");
        Ok(count)
    }
}

/// Build the key map from a fetched set, skipping unusable entries.
fn parse_key_set(set: &JwkSet) -> KeyMap {
    let mut keys = HashMap::with_capacity(set.keys.len());

    for jwk in &set.keys {
        if jwk.kty != "RSA" {
            debug!(kty = %jwk.kty, "Skipping non-RSA key");
            continue;
        }
        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            debug!(key_use = ?jwk.key_use, "Skipping key not meant for signatures");
            continue;
        }
        let Some(kid) = jwk.kid.as_deref().filter(|k| !k.is_empty()) else {
            warn!("Skipping RSA key without kid");
            continue;
        };
        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            warn!(kid, "Skipping RSA key without modulus or exponent");
            continue;
        };
        if n.is_empty() || e.is_empty() {
            warn!(kid, "Skipping RSA key with empty modulus or exponent");
            continue;
        }

        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => {
                keys.insert(kid.to_string(), Arc::new(key));
            }
            Err(err) => warn!(kid, error = %err, "Skipping unparseable RSA key"),
        }
    }

    keys
}
