//! Error types of the timetable feed.

use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors that can abort building a feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Required settings are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested date window or another request parameter is malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The timetable service could not be reached or sent an invalid HTTP response.
    #[error("timetable service unreachable: {0}")]
    Provider(#[from] reqwest::Error),

    /// The timetable service answered with a JSON-RPC error object.
    #[error("timetable service rejected {method}: {message} (code {code})")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// The requested class does not exist on the timetable service.
    #[error("class '{0}' not found")]
    ClassNotFound(String),
}

impl FeedError {
    /// Whether the error was caused by the caller rather than by the server or its upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the error originates from the timetable service.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::Rpc { .. } | Self::ClassNotFound(_)
        )
    }
}
