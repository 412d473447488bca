//! Datafeed error taxonomy

use thiserror::Error;

pub type FeedResult<T> = Result<T, FeedError>;

/// Everything that can go wrong between the charting front end and an
/// exchange. Variants carry human-readable context; callers match on the
/// variant, not the message.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("unsupported resolution: {0}")]
    UnsupportedInterval(String),

    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("malformed kline record: {0}")]
    Decode(String),

    #[error("instrument metadata load failed: {0}")]
    MetadataLoadFailed(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("history fetch failed: {0}")]
    HistoryFetchFailed(String),
}

impl FeedError {
    pub(crate) fn metadata(err: impl std::fmt::Display) -> Self {
        FeedError::MetadataLoadFailed(err.to_string())
    }

    pub(crate) fn history(err: impl std::fmt::Display) -> Self {
        FeedError::HistoryFetchFailed(err.to_string())
    }
}
