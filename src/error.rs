//! Error types for the node template operator

use thiserror::Error;

use crate::cloud::CloudError;
use crate::selector::SelectorError;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Inventory API error while resolving a selector
    #[error("Cloud inventory error: {0}")]
    Cloud(#[from] CloudError),

    /// Malformed selector in the NodeTemplate spec
    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    /// Optimistic-concurrency conflict while patching status
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The object was deleted while it was being reconciled
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl Error {
    /// Whether a later attempt may succeed without a change to the spec or configuration
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(resp)) => {
                resp.code == 409 || resp.code == 429 || resp.code >= 500
            }
            Error::KubeError(_) => true,
            Error::Cloud(err) => err.is_retriable(),
            Error::Conflict(_) => true,
            Error::HttpError(_) => true,
            Error::Selector(_)
            | Error::NotFound(_)
            | Error::ConfigError(_)
            | Error::SerializationError(_) => false,
        }
    }

    /// Short category name for metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::Cloud(_) => "cloud",
            Error::Selector(_) => "selector",
            Error::Conflict(_) => "conflict",
            Error::NotFound(_) => "not_found",
            Error::ConfigError(_) => "config",
            Error::SerializationError(_) => "serialization",
            Error::HttpError(_) => "http",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
