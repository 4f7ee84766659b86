use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

/// One fetched slice of the listing plus a "more data available" flag.
#[derive(Debug, Clone)]
pub struct Page<R> {
  /// Zero-based page number
  pub index: usize,
  /// Normalized records in scan order, at most the cache's page size
  pub records: Vec<R>,
  /// Whether the lookahead record showed a further page
  pub has_next: bool,
  /// When the page was read from the store
  pub fetched_at: DateTime<Utc>,
}

impl<R> Page<R> {
  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn has_previous(&self) -> bool {
    self.index > 0
  }
}

/// Errors returned by page cache operations.
#[derive(Debug, ThisError)]
pub enum PageError {
  /// The backend query failed. The cursor table is unchanged and the same
  /// call can be retried.
  #[error("store query failed: {0}")]
  Store(color_eyre::Report),

  /// A page was requested without first visiting the page before it.
  #[error("page {requested} requested before page {missing} was fetched")]
  MissingCursor { requested: usize, missing: usize },

  /// Another fetch on the same cache has not finished yet.
  #[error("a page fetch is already in progress")]
  Busy,

  #[error("page size must be between 1 and usize::MAX - 1")]
  InvalidPageSize,

  #[error("invalid order key '{0}'")]
  InvalidOrderKey(String),
}

impl PageError {
  /// Transient failures worth offering a retry for.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Store(_) | Self::Busy)
  }
}
