//! Response bodies for the REST API

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Resolved IDs for one selector of a NodeTemplate
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdsResponse {
    pub name: String,
    pub resource: String,
    pub ids: Vec<String>,
    pub total: usize,
}

/// Result of a cache invalidation request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheInvalidatedResponse {
    /// Entries held by the cache right before it was cleared
    pub evicted: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}
