//! Key Set Cache: published RSA verification keys, cached by key id.
//!
//! The whole key set lives in one immutable [`KeySnapshot`] behind an
//! `RwLock<Arc<_>>`. A refresh builds a fresh snapshot off-lock and swaps it in,
//! so readers observe either the old or the new set in full. No lock is held
//! across the fetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::KeySetError;

/// One entry of a published key collection (JWK subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkEntry {
    #[serde(default)]
    pub kid: String,
    #[serde(default)]
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
}

impl JwkEntry {
    /// RSA signing key with a usable id.
    ///
    /// An `alg`, when published, must belong to the RSA signature family.
    pub fn is_rsa_signing_key(&self) -> bool {
        let alg_ok = self
            .alg
            .as_deref()
            .is_none_or(|alg| alg.starts_with("RS") || alg.starts_with("PS"));
        !self.kid.is_empty()
            && self.kty == "RSA"
            && self.key_use.as_deref() == Some("sig")
            && alg_ok
    }
}

/// A published key collection (`{"keys": [...]}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkCollection {
    #[serde(default)]
    pub keys: Vec<JwkEntry>,
}

/// Where the cache gets its keys from.
///
/// The HTTP implementation lives in the infra crate; tests use static sources.
#[async_trait]
pub trait KeySetSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<JwkCollection, KeySetError>;
}

/// Immutable key set plus the instant it was fetched.
#[derive(Clone, Default)]
pub struct KeySnapshot {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl KeySnapshot {
    /// Parse a collection, discarding entries that are not RSA signing keys or
    /// whose modulus/exponent do not decode.
    pub fn from_collection(collection: &JwkCollection, fetched_at: Instant) -> Self {
        let mut keys = HashMap::with_capacity(collection.keys.len());
        for entry in &collection.keys {
            if !entry.is_rsa_signing_key() {
                debug!(kid = %entry.kid, kty = %entry.kty, "skipping non-signing key");
                continue;
            }
            match DecodingKey::from_rsa_components(&entry.n, &entry.e) {
                Ok(key) => {
                    keys.insert(entry.kid.clone(), key);
                }
                Err(err) => warn!(kid = %entry.kid, error = %err, "skipping malformed RSA key"),
            }
        }
        Self {
            keys,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.is_none_or(|at| at.elapsed() >= ttl)
    }
}

impl core::fmt::Debug for KeySnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut kids: Vec<&String> = self.keys.keys().collect();
        kids.sort();
        f.debug_struct("KeySnapshot")
            .field("kids", &kids)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache of verification keys keyed by `kid`.
///
/// Refreshes on a miss and on any access once the snapshot is older than the
/// TTL. Concurrent refreshes may race; the last completed one wins.
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    snapshot: RwLock<Arc<KeySnapshot>>,
    ttl: Duration,
    fetch_timeout: Duration,
    refreshes: AtomicU64,
}

impl KeySetCache {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(KeySnapshot::default())),
            ttl: DEFAULT_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Resolve the verification key for `kid`.
    pub async fn get_key(&self, kid: &str) -> Result<DecodingKey, KeySetError> {
        let current = self.snapshot();
        if !current.is_stale(self.ttl) {
            if let Some(key) = current.keys.get(kid) {
                return Ok(key.clone());
            }
        }

        self.refresh().await?;

        self.snapshot()
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeySetError::NotFound(kid.to_string()))
    }

    /// Fetch the published collection and replace the cached set as a whole.
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        let collection = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| KeySetError::Timeout(self.fetch_timeout))
            .and_then(|fetched| fetched)
            .inspect_err(|err| warn!(error = %err, "key set refresh failed"))?;

        let fresh = Arc::new(KeySnapshot::from_collection(&collection, Instant::now()));
        let count = fresh.len();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fresh;
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        info!(key_count = count, "key set refreshed");
        Ok(count)
    }

    /// Key ids in the current snapshot, sorted.
    pub fn key_ids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.snapshot().keys.keys().cloned().collect();
        kids.sort();
        kids
    }

    /// Number of successful refreshes since construction.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> Arc<KeySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl core::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("snapshot", &self.snapshot())
            .field("ttl", &self.ttl)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}
