/// Error types for feed-graph-service
///
/// Four outward kinds only. Ownership mismatches are reported as `NotFound`
/// so callers cannot probe who owns a post or comment.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl FeedError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// HTTP status a boundary adapter should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            FeedError::NotFound(_) => 404,
            FeedError::Validation(_) => 422,
            FeedError::Conflict(_) => 409,
            FeedError::UpstreamUnavailable(_) => 503,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FeedError::NotFound(_))
    }
}

/// Graph store and profile store adapters report failures through anyhow;
/// anything that escapes them is an unreachable or failing upstream.
impl From<anyhow::Error> for FeedError {
    fn from(err: anyhow::Error) -> Self {
        FeedError::UpstreamUnavailable(format!("{:#}", err))
    }
}

impl From<validator::ValidationErrors> for FeedError {
    fn from(err: validator::ValidationErrors) -> Self {
        FeedError::Validation(err.to_string())
    }
}

/// Result type alias for feed operations
pub type FeedResult<T> = Result<T, FeedError>;
