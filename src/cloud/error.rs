//! Classified inventory API errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// Request rate exceeded
    #[error("inventory API throttled the request: {0}")]
    Throttled(String),

    #[error("inventory API request timed out")]
    Timeout,

    /// 5xx-class failure on the inventory side
    #[error("inventory API unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Connection-level failure before a response was received
    #[error("inventory API transport error: {0}")]
    Transport(String),

    #[error("not authorized to query the inventory API: {0}")]
    Unauthorized(String),

    /// The backend rejected the request, e.g. an unknown filter name
    #[error("inventory API rejected the request: {0}")]
    InvalidRequest(String),

    #[error("malformed inventory API response: {0}")]
    Malformed(String),
}

impl CloudError {
    /// Whether the same request may succeed later without any configuration change
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CloudError::Throttled(_)
                | CloudError::Timeout
                | CloudError::Unavailable { .. }
                | CloudError::Transport(_)
        )
    }

    /// Short machine-readable name, used for metrics labels and event reasons
    pub fn kind(&self) -> &'static str {
        match self {
            CloudError::Throttled(_) => "throttled",
            CloudError::Timeout => "timeout",
            CloudError::Unavailable { .. } => "unavailable",
            CloudError::Transport(_) => "transport",
            CloudError::Unauthorized(_) => "unauthorized",
            CloudError::InvalidRequest(_) => "invalid_request",
            CloudError::Malformed(_) => "malformed",
        }
    }
}
