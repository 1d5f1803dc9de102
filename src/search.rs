//! External keyword-search provider.
//!
//! Handlers talk to a trait object so the web layer stays testable without
//! network access. Provider failures never reach the client: the result set
//! just comes back empty.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    pub link: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Ranked results for a query. Empty/whitespace queries and provider
    /// failures both yield an empty vec.
    async fn search(&self, query: &str) -> Vec<SearchResult>;
}

pub struct HttpSearchProvider {
    client: reqwest::Client,
    config: SearchConfig,
}

impl HttpSearchProvider {
    pub fn from_config(config: SearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn run_query(&self, endpoint: &str, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let mut request = self
            .client
            .get(endpoint)
            .query(&[("q", query), ("count", &self.config.max_results.to_string())]);
        if let Some(ref key) = self.config.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?.error_for_status()?;
        let decoded: SearchResponse = response.json().await?;

        let mut results = decoded.results;
        results.truncate(self.config.max_results);
        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let Some(endpoint) = self.config.endpoint.clone() else {
            tracing::warn!("search requested but no search endpoint is configured");
            return Vec::new();
        };

        match self.run_query(&endpoint, query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("search provider failed, returning no results: {}", e);
                Vec::new()
            }
        }
    }
}
