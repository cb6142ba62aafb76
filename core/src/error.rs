use thiserror::Error;

/// Failures surfaced by the index stores and the ranking engine.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Open, I/O or lock failure in the underlying store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Ranking-time miss; callers treat it as a zero contribution.
    #[error("term not indexed: {0}")]
    TermNotIndexed(String),

    #[error("malformed record under {key}: {reason}")]
    MalformedRecord { key: String, reason: String },
}

impl IndexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::NotFound(_))
    }

    pub(crate) fn malformed(key: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        IndexError::MalformedRecord { key: key.to_string(), reason: reason.to_string() }
    }
}

impl From<sled::Error> for IndexError {
    fn from(err: sled::Error) -> Self {
        match err {
            sled::Error::Corruption { .. } => IndexError::malformed("<store>", err),
            other => IndexError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        IndexError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
