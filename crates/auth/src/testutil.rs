//! Shared test utilities for token authentication.
//!
//! Generates one RSA key pair per test binary, publishes it as a key
//! collection under any number of key ids, and mints signed tokens. It is
//! feature-gated behind `testutil` so it never ships in production builds:
//!
//! ```toml
//! [dev-dependencies]
//! relation-auth = { path = "../auth", features = ["testutil"] }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{Value, json};

use crate::{JwkCollection, JwkEntry, KeySetError, KeySetSource};

pub const CLIENT_ID: &str = "7c1a0b52-2d11-4a4e-9f39-5d5c0e1f2a10";
pub const TENANT_ID: &str = "b6f3d1c4-88a2-4f0e-bb1a-0e7f9c3d2a55";

pub fn issuer() -> String {
    format!("https://login.microsoftonline.com/{TENANT_ID}/v2.0")
}

/// Process-wide RSA key; generating 2048-bit keys is slow in debug builds.
///
/// # Panics
///
/// Panics if key generation fails.
pub fn signing_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("rsa key"))
}

/// A key collection publishing [`signing_key`] under each of `kids`.
pub fn jwks(kids: &[&str]) -> JwkCollection {
    let public = signing_key().to_public_key();
    let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());
    JwkCollection {
        keys: kids
            .iter()
            .map(|kid| JwkEntry {
                kid: (*kid).to_string(),
                kty: "RSA".into(),
                key_use: Some("sig".into()),
                alg: Some("RS256".into()),
                n: n.clone(),
                e: e.clone(),
            })
            .collect(),
    }
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Standard valid claims (issuer, audience, five minute lifetime) merged with `extra`.
pub fn claims(extra: Value) -> Value {
    let now = now();
    let mut claims = json!({
        "iss": issuer(),
        "aud": CLIENT_ID,
        "iat": now,
        "nbf": now,
        "exp": now + 300,
    });
    if let (Some(base), Value::Object(extra)) = (claims.as_object_mut(), extra) {
        base.extend(extra);
    }
    claims
}

/// Sign `claims` with [`signing_key`] (RS256) under `kid`.
///
/// # Panics
///
/// Panics if encoding fails.
pub fn mint(kid: &str, claims: Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let pem = signing_key()
        .to_pkcs1_pem(Default::default())
        .expect("pem");
    jsonwebtoken::encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(pem.as_bytes()).expect("encoding key"),
    )
    .expect("token")
}

/// In-process [`KeySetSource`] counting its fetches.
pub struct StaticKeySource {
    collection: Mutex<Result<JwkCollection, String>>,
    fetches: AtomicUsize,
    delay: Option<Duration>,
}

impl StaticKeySource {
    pub fn new(collection: JwkCollection) -> Self {
        Self {
            collection: Mutex::new(Ok(collection)),
            fetches: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            collection: Mutex::new(Err(reason.to_string())),
            fetches: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn replace(&self, collection: JwkCollection) {
        *self.collection.lock().unwrap_or_else(PoisonError::into_inner) = Ok(collection);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for StaticKeySource {
    async fn fetch(&self) -> Result<JwkCollection, KeySetError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.collection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map_err(KeySetError::Fetch)
    }
}
