use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type TermId = u64;
pub type DocId = u64;

/// Occurrences of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub positions: Vec<u64>, // in token order
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermFrequency {
    pub term_id: TermId,
    pub frequency: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: String,
    pub url: String,
    pub size_bytes: u64,
    pub last_modified: OffsetDateTime,
}

impl PageRecord {
    /// Stub for a page that has been linked to but not fetched yet.
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self { title: String::new(), url: url.into(), size_bytes: 0, last_modified: OffsetDateTime::now_utc() }
    }
}

/// Highest frequency in a document's term list, 0 for an empty list.
pub fn max_frequency(terms: &[TermFrequency]) -> u64 {
    terms.iter().map(|t| t.frequency).max().unwrap_or(0)
}
