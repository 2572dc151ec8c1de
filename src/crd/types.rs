//! Shared types for the NodeTemplate status

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::record::ResolvedRecord;

/// A resolved subnet as recorded in the status
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl From<&ResolvedRecord> for SubnetStatus {
    fn from(record: &ResolvedRecord) -> Self {
        Self {
            id: record.id.clone(),
            zone: record.zone.clone(),
        }
    }
}

/// A resolved security group as recorded in the status
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupStatus {
    pub id: String,
}

impl From<&ResolvedRecord> for SecurityGroupStatus {
    fn from(record: &ResolvedRecord) -> Self {
        Self {
            id: record.id.clone(),
        }
    }
}

/// Condition for status reporting
///
/// Reports the status of a condition on the NodeTemplate resource.
/// Follows Kubernetes convention for condition reporting.
///
/// # Examples
///
/// ```rust,no_run
/// use node_template_operator::crd::Condition;
///
/// let condition = Condition::ready(true, "Resolved", "All selectors resolved");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "Ready")
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition: "True", "False", or "Unknown"
    pub status: String,
    /// Last time the condition transitioned
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    pub reason: String,
    /// Human-readable message
    pub message: String,
    /// The .metadata.generation the condition was computed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new Ready condition
    pub fn ready(status: bool, reason: &str, message: &str) -> Self {
        Self {
            type_: "Ready".to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: chrono::Utc::now().to_rfc3339(),
            reason: reason.to_string(),
            message: message.to_string(),
            observed_generation: None,
        }
    }
}
