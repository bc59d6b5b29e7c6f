use thiserror::Error;

/// Failure from a backend call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-2xx response.
    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },
    /// Connection / transport failure before a response arrived.
    #[error("request failed: {0}")]
    Transport(String),
}

/// Errors surfaced by engine operations.
///
/// Stale async results are not represented here: a recompute that loses the
/// staleness race is discarded silently, never reported.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any network call.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The backend rejected or never received the write; any optimistic
    /// local state has been rolled back by the time this is returned.
    #[error(transparent)]
    Remote(#[from] ApiError),
    #[error("no feature with id {0}")]
    UnknownFeature(u64),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}
