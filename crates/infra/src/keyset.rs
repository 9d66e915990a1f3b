//! HTTP key-set source: plain GET of a published key collection.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use relation_auth::{JwkCollection, KeySetError, KeySetSource};

#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Source with a client-level timeout in addition to the cache's own bound.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Published key endpoint of a Microsoft identity platform tenant.
    pub fn azure_ad_url(instance_url: &str, tenant_id: &str) -> String {
        let instance = instance_url.trim_end_matches('/');
        format!("{instance}/{tenant_id}/discovery/v2.0/keys")
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkCollection, KeySetError> {
        debug!(url = %self.url, "fetching key set");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::Fetch(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        response
            .json::<JwkCollection>()
            .await
            .map_err(|e| KeySetError::Fetch(format!("invalid key set document: {e}")))
    }
}
