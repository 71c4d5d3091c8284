//! Trend queries and signals.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A request for trending topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct TrendQuery {
    /// Search terms
    query: String,
    /// Maximum topics wanted
    limit: usize,
}

impl TrendQuery {
    /// Create a query.
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
        }
    }
}

/// Trending topics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct TrendSignal {
    /// Topic titles, most relevant first
    topics: Vec<String>,
    /// When the topics were fetched
    fetched_at: DateTime<Utc>,
}

impl TrendSignal {
    /// Create a signal.
    pub fn new(topics: Vec<String>, fetched_at: DateTime<Utc>) -> Self {
        Self { topics, fetched_at }
    }

    /// Hashtags derived from the topics: lowercased, whitespace removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use herald_core::TrendSignal;
    ///
    /// let signal = TrendSignal::new(vec!["Rust Lang".into(), "AI".into()], Utc::now());
    /// assert_eq!(signal.hashtags(), vec!["#rustlang", "#ai"]);
    /// ```
    pub fn hashtags(&self) -> Vec<String> {
        self.topics
            .iter()
            .map(|topic| {
                let tag: String = topic
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .flat_map(char::to_lowercase)
                    .collect();
                format!("#{tag}")
            })
            .filter(|tag| tag.len() > 1)
            .collect()
    }
}
