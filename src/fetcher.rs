//! Resource Fetcher Module
//!
//! Asynchronous retrieval of image payloads. No retries happen here; a caller
//! that wants another attempt has to start a new load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Resource Fetcher Trait ==
/// Retrieves the binary payload behind a locator.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetches `locator`, failing with a network error on transport failure
    /// or a non-success status.
    async fn fetch(&self, locator: &str) -> Result<Bytes>;
}

// == HTTP Fetcher ==
/// Fetches images over HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher sending `user_agent` with every request.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CacheError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        debug!("Fetching image {}", locator);

        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| CacheError::Network {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(CacheError::HttpStatus {
                locator: locator.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.bytes().await.map_err(|e| CacheError::Network {
            locator: locator.to_string(),
            reason: format!("failed to read body: {}", e),
        })
    }
}

// == Static Fetcher ==
/// In-memory fetcher serving a fixed set of payloads.
///
/// Unknown locators answer like a 404. Useful for hosts that bundle images
/// and for exercising the cache without a network.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    payloads: HashMap<String, Bytes>,
    requests: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a payload for `locator`.
    pub fn with(mut self, locator: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        self.payloads.insert(locator.into(), payload.into());
        self
    }

    /// Number of fetches issued so far, successful or not.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for StaticFetcher {
    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .get(locator)
            .cloned()
            .ok_or_else(|| CacheError::HttpStatus {
                locator: locator.to_string(),
                status: 404,
            })
    }
}
