//! Record store trait - the seam between sync logic and the remote API
//!
//! Fetcher and writer only see this trait, so tests can drive them with an
//! in-memory store instead of a live endpoint.

use async_trait::async_trait;

use crate::record::Record;

#[derive(Debug)]
pub enum RemoteError {
    /// Remote answered 429 Too Many Requests.
    RateLimited,
    /// Any other non-success status.
    Api { status: u16, message: String },
    Network(reqwest::Error),
    /// Response decoded, but the payload shape was not usable.
    InvalidResponse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Network(err)
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::RateLimited => write!(f, "Rate limited by remote store"),
            RemoteError::Api { status, message } => {
                write!(f, "Remote API error (status {}): {}", status, message)
            }
            RemoteError::Network(e) => write!(f, "Network error: {}", e),
            RemoteError::InvalidResponse(e) => write!(f, "Invalid response: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

/// One page of a paginated query.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<Record>,
    /// Cursor for the next request; `None` when the listing is exhausted.
    pub next_cursor: Option<String>,
}

/// Remote database holding the task records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one page of records. The first call passes no cursor; follow-up
    /// calls pass the cursor returned by the previous page.
    async fn query_page(&self, cursor: Option<&str>) -> Result<RecordPage, RemoteError>;

    /// Patch the stored estimate aggregate of a single record.
    async fn update_estimate(&self, record_id: &str, total: f64) -> Result<(), RemoteError>;
}
