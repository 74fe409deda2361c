//! Web evidence retrieval.
//!
//! [`Retriever`] is the seam the pipeline searches through;
//! [`TavilyRetriever`] backs it with the Tavily search API.

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::types::EvidenceItem;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Searches the web for evidence about a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return evidence for `query`. An empty list means nothing was found
    /// and is not an error.
    async fn search(&self, query: &str) -> Result<Vec<EvidenceItem>, RetrievalError>;
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

impl From<TavilyResult> for EvidenceItem {
    fn from(r: TavilyResult) -> Self {
        EvidenceItem {
            url: r.url,
            title: r.title.filter(|t| !t.is_empty()),
            content: r.content,
            score: r.score,
        }
    }
}

/// Tavily search client.
pub struct TavilyRetriever {
    client: Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
    search_depth: String,
}

impl TavilyRetriever {
    pub fn new(config: &RetrievalConfig) -> Result<Self, RetrievalError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RetrievalError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Request {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.base_url.clone(),
            api_key,
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
        })
    }

    fn request_body(&self, query: &str) -> serde_json::Value {
        json!({
            "query": query,
            "search_depth": self.search_depth,
            "max_results": self.max_results,
            "include_raw_content": false,
        })
    }

    fn parse_response(body: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let parsed: TavilyResponse =
            serde_json::from_str(body).map_err(|e| RetrievalError::ResponseParse {
                message: e.to_string(),
            })?;
        Ok(parsed
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty() || !r.content.is_empty())
            .map(EvidenceItem::from)
            .collect())
    }
}

#[async_trait]
impl Retriever for TavilyRetriever {
    async fn search(&self, query: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        debug!(endpoint = %self.endpoint, max_results = self.max_results, "Sending search request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| RetrievalError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RetrievalError::Request {
            message: format!("Failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let items = Self::parse_response(&body)?;
        debug!(results = items.len(), "Search returned");
        Ok(items)
    }
}
