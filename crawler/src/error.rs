use thiserror::Error;
use trawl_core::IndexError;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Network error, non-2xx or non-HTML response. Drops one branch only.
    #[error("fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("invalid seed url {0}")]
    InvalidSeed(String),

    #[error("invalid crawl configuration: {0}")]
    InvalidConfig(String),

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("crawl task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CrawlError {
    pub(crate) fn fetch(url: &url::Url, reason: impl std::fmt::Display) -> Self {
        CrawlError::FetchFailed { url: url.to_string(), reason: reason.to_string() }
    }
}
