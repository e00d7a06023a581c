use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the announcer's components.
///
/// Everything except `Config` is caught at the cycle boundary by the runner,
/// logged, and retried on the next scheduled tick.
#[derive(Error, Debug)]
pub enum AnnouncerError {
    /// The search endpoint answered with a non-success status.
    #[error("Remote fetch failed with status {status}: {payload}")]
    RemoteFetch {
        status: reqwest::StatusCode,
        payload: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("Remote fetch transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected search list schema.
    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("Pagination limit exceeded after {limit} page fetches")]
    PaginationLimitExceeded { limit: usize },

    #[error("Watermark store error at {}: {source}", path.display())]
    WatermarkStore {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Delivery of a single announcement failed.
    #[error("Announcement error: {0}")]
    Announcement(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnnouncerError {
    pub(crate) fn watermark(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AnnouncerError::WatermarkStore {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnouncerError>;
