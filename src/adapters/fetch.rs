//! Schema sources
//!
//! The core never performs network I/O on its own. Remote `$ref` documents are
//! obtained through a [`SchemaFetcher`] before compilation starts.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::FetchSettings;
use crate::domain::FetchError;

/// Capability to retrieve a schema document by absolute URL
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError>;
}

/// HTTP schema source with an in-memory cache keyed by URL
#[derive(Clone)]
pub struct HttpSchemaFetcher {
    client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, Value>>>,
}

impl HttpSchemaFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|source| FetchError::Http {
                url: String::new(),
                source,
            })?;

        Ok(Self {
            client,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// URLs fetched so far
    pub async fn cached_urls(&self) -> Vec<String> {
        let cache = self.cache.read().await;
        cache.keys().cloned().collect()
    }
}

#[async_trait]
impl SchemaFetcher for HttpSchemaFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        {
            let cache = self.cache.read().await;
            if let Some(doc) = cache.get(url) {
                return Ok(doc.clone());
            }
        }

        let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        tracing::debug!("Fetching schema {}", url);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let doc: Value = response.json().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        let mut cache = self.cache.write().await;
        cache.insert(url.to_string(), doc.clone());
        Ok(doc)
    }
}

/// In-memory schema source for tests and embedders that bundle their documents
#[derive(Clone, Debug, Default)]
pub struct StaticSchemaFetcher {
    documents: HashMap<String, Value>,
}

impl StaticSchemaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, doc: Value) -> Self {
        self.documents.insert(url.into(), doc);
        self
    }
}

#[async_trait]
impl SchemaFetcher for StaticSchemaFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

/// Schema source used when fetching is turned off
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledFetcher;

#[async_trait]
impl SchemaFetcher for DisabledFetcher {
    async fn fetch(&self, _url: &str) -> Result<Value, FetchError> {
        Err(FetchError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticSchemaFetcher::new()
            .with_document("https://schemas.test/a.json", json!({ "type": "string" }));

        let doc = fetcher.fetch("https://schemas.test/a.json").await.unwrap();
        assert_eq!(doc, json!({ "type": "string" }));

        let missing = fetcher.fetch("https://schemas.test/b.json").await;
        assert!(matches!(missing, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_disabled_fetcher() {
        let result = DisabledFetcher.fetch("https://schemas.test/a.json").await;
        assert!(matches!(result, Err(FetchError::Disabled)));
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_invalid_url() {
        let fetcher = HttpSchemaFetcher::new(&FetchSettings::default()).unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
        assert!(fetcher.cached_urls().await.is_empty());
    }
}
