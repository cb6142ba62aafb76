use crate::config::CrawlConfig;
use crate::error::CrawlError;
use reqwest::{header, Client, StatusCode};
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub size_bytes: u64,
    pub last_modified: Option<OffsetDateTime>,
}

/// HTTP access for the crawl. Every request holds one permit of a shared
/// semaphore, so `max_concurrency` bounds page fetches and probes together.
pub struct Fetcher {
    client: Client,
    permits: Semaphore,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, permits: Semaphore::new(config.max_concurrency), max_body_bytes: config.max_body_bytes })
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlError> {
        let _permit = self.permits.acquire().await.map_err(|e| CrawlError::fetch(url, e))?;
        let resp = self.client.get(url.clone()).send().await.map_err(|e| CrawlError::fetch(url, e))?;
        if !resp.status().is_success() {
            return Err(CrawlError::fetch(url, format!("status {}", resp.status())));
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
            if let Ok(v) = ct.to_str() {
                if !v.starts_with("text/html") {
                    return Err(CrawlError::fetch(url, format!("content type {v}")));
                }
            }
        }
        let declared = resp.content_length().filter(|n| *n > 0);
        let last_modified = resp
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);
        let bytes = resp.bytes().await.map_err(|e| CrawlError::fetch(url, e))?;
        if bytes.len() > self.max_body_bytes {
            return Err(CrawlError::fetch(url, format!("body of {} bytes exceeds limit", bytes.len())));
        }
        Ok(FetchedPage {
            body: String::from_utf8_lossy(&bytes).to_string(),
            size_bytes: declared.unwrap_or(bytes.len() as u64),
            last_modified,
        })
    }

    /// Existence check for a link: HEAD, or GET when the server refuses HEAD.
    pub async fn probe(&self, url: &Url) -> Result<(), CrawlError> {
        let _permit = self.permits.acquire().await.map_err(|e| CrawlError::fetch(url, e))?;
        let mut status = self.client.head(url.clone()).send().await.map_err(|e| CrawlError::fetch(url, e))?.status();
        if matches!(status, StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED) {
            status = self.client.get(url.clone()).send().await.map_err(|e| CrawlError::fetch(url, e))?.status();
        }
        if status.is_success() {
            Ok(())
        } else {
            Err(CrawlError::fetch(url, format!("status {status}")))
        }
    }
}

/// Parses an HTTP date such as `Wed, 21 Oct 2015 07:28:00 GMT`.
pub fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    OffsetDateTime::parse(value, &Rfc2822).ok().or_else(|| {
        let numeric = value.strip_suffix("GMT").or_else(|| value.strip_suffix("UTC"))?;
        OffsetDateTime::parse(&format!("{numeric}+0000"), &Rfc2822).ok()
    })
}
