//! HTTP client for the upstream reading source.
//!
//! Fetches the raw JSON payload from `SENSOR_SOURCE_URL` and memoizes the
//! last successful body for `CACHE_TTL_SECS`. A TTL of zero disables the
//! cache. Failed fetches are never cached.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::Client;
use serde_json::Value;

use crate::error::SourceError;
use crate::Config;

// ---

#[derive(Clone)]
pub struct SourceClient {
    http: Client,
    url: String,
    auth: Option<String>,
    cache: Option<Cache<String, Arc<Value>>>,
}

impl SourceClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Client` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        // ---
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;

        let cache = (config.cache_ttl_secs > 0).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(config.cache_ttl())
                .build()
        });

        Ok(Self {
            http,
            url: config.source_url.clone(),
            auth: config.source_auth.clone(),
            cache,
        })
    }

    /// Raw payload, from cache when fresh.
    ///
    /// Concurrent misses share a single upstream request.
    pub async fn fetch(&self) -> Result<Arc<Value>, SourceError> {
        // ---
        match &self.cache {
            Some(cache) => cache
                .try_get_with(self.url.clone(), self.fetch_uncached())
                .await
                .map_err(|e| (*e).clone()),
            None => self.fetch_uncached().await,
        }
    }

    /// Drop any memoized payload so the next fetch goes upstream.
    pub async fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&self.url).await;
        }
    }

    async fn fetch_uncached(&self) -> Result<Arc<Value>, SourceError> {
        // ---
        tracing::debug!("Fetching readings from: {}", self.url);

        let mut request = self.http.get(&self.url);
        if let Some(token) = &self.auth {
            request = request.query(&[("auth", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        tracing::info!("Fetched readings payload from {}", self.url);
        Ok(Arc::new(payload))
    }
}
