use crate::error::CrawlError;
use serde::Serialize;
use std::time::Duration;

/// What to do when a page is reached again within the depth budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RevisitPolicy {
    /// Fetch each document at most once per crawl.
    #[default]
    Skip,
    /// Fetch again and re-dispatch its links. Text is still indexed once.
    Refetch,
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Link depth below the seed (depth 0) whose pages are still fetched.
    pub max_depth: usize,
    /// Simultaneous page fetches and link probes, crawl-wide.
    pub max_concurrency: usize,
    pub revisit: RevisitPolicy,
    pub timeout: Duration,
    pub user_agent: String,
    /// Only follow links on the host of the page they appear on.
    pub same_host_only: bool,
    pub max_body_bytes: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_concurrency: 2,
            revisit: RevisitPolicy::Skip,
            timeout: Duration::from_secs(12),
            user_agent: "trawl-bot/0.1 (+https://example.com/bot)".to_string(),
            same_host_only: false,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.max_concurrency == 0 {
            return Err(CrawlError::InvalidConfig("max_concurrency must be at least 1".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(CrawlError::InvalidConfig("max_body_bytes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = CrawlConfig { max_concurrency: 0, ..CrawlConfig::default() };
        assert!(matches!(config.validate(), Err(CrawlError::InvalidConfig(_))));
        assert!(CrawlConfig::default().validate().is_ok());
    }
}
