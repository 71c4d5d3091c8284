//! SerpAPI Google Trends client.

use crate::http::{error_body, error_from_reqwest, error_from_status};
use async_trait::async_trait;
use chrono::Utc;
use herald_core::{TrendQuery, TrendSignal};
use herald_error::GenerationError;
use herald_interface::TrendSource;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://serpapi.com";

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    #[serde(default)]
    trending_searches: Vec<TrendingSearch>,
}

#[derive(Debug, Deserialize)]
struct TrendingSearch {
    title: String,
}

/// Trending topics from SerpAPI's `google_trends` engine.
///
/// An empty result yields the configured fallback topics.
#[derive(Debug, Clone)]
pub struct SerpApiTrends {
    client: Client,
    api_key: String,
    base_url: String,
    fallback_topics: Vec<String>,
}

impl SerpApiTrends {
    /// Creates a client with fallback topics used when nothing is trending.
    pub fn new(api_key: impl Into<String>, fallback_topics: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            fallback_topics,
        }
    }

    /// Use a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TrendSource for SerpApiTrends {
    #[instrument(skip(self, query), fields(query = %query.query()))]
    async fn search(&self, query: &TrendQuery) -> Result<TrendSignal, GenerationError> {
        let url = format!("{}/search.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("engine", "google_trends"),
                ("q", query.query().as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(error_from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), error_body(response).await));
        }

        let parsed: TrendsResponse = response.json().await.map_err(error_from_reqwest)?;
        let mut topics: Vec<String> = parsed
            .trending_searches
            .into_iter()
            .map(|search| search.title)
            .filter(|title| !title.trim().is_empty())
            .take(*query.limit())
            .collect();

        if topics.is_empty() {
            debug!("No trending searches, using fallback topics");
            topics = self.fallback_topics.clone();
        }

        Ok(TrendSignal::new(topics, Utc::now()))
    }

    fn provider_name(&self) -> &str {
        "serpapi"
    }
}
