// src/ingest/types.rs
use anyhow::Result;
use chrono::NaiveDate;

/// One feed entry as handed to the classifier.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub source: String, // configured feed name, e.g. "ChainFeeds"
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: NaiveDate, // UTC calendar date of the entry
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Every entry the feed currently carries; date filtering happens in the collector.
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
}
