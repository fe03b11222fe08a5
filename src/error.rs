//! Error types for the crawler.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for crawler operations.
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Failures from a single anchor fetch.
///
/// Both variants are recoverable at the unit level: the orchestrator logs
/// them and skips the title or actor that triggered them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The anchor element never appeared before the deadline.
    #[error("anchor `{selector}` not found on {url}")]
    NotFound { url: String, selector: String },
    /// The browser session or navigation failed.
    #[error("driver failure on {url}: {reason}")]
    DriverFailure { url: String, reason: String },
}

impl FetchError {
    /// Whether a retry can reasonably change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::DriverFailure { .. })
    }
}

/// Errors raised by a [`crate::browser::PageDriver`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("timed out after {0}s waiting for element")]
    Timeout(u64),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("browser session error: {0}")]
    Session(String),
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed record for title {title_id}: {reason}")]
    MalformedRecord { title_id: String, reason: String },
    #[error("no data to write for window {0}")]
    NoDataToWrite(usize),
    #[error("window {0} is not open")]
    UnknownWindow(usize),
    #[error("progress file {path} does not match input: {reason}")]
    ProgressMismatch { path: PathBuf, reason: String },
    #[error("crawl is incomplete ({next_row} of {total_rows} rows done); finish it or force the merge")]
    CrawlIncomplete { next_row: usize, total_rows: usize },
    #[error("merged checkpoints could not be removed: {}", join_paths(.paths))]
    CheckpointCleanup {
        paths: Vec<PathBuf>,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Other(String),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<tempfile::PersistError> for CrawlError {
    fn from(e: tempfile::PersistError) -> Self {
        CrawlError::Io(e.error)
    }
}
