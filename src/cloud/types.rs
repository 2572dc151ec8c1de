//! Inventory API request and response types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CloudError;
use crate::record::{ResolvedRecord, ResourceKind};

/// One native filter criterion. Separate filters are AND-ed by the backend,
/// the values inside one filter are OR-ed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// One page of a paginated describe call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<ResolvedRecord>,
    /// Continuation token, `None` on the last page
    pub next_token: Option<String>,
}

/// The cloud inventory operations the providers rely on
#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn describe_subnets(
        &self,
        filters: &[Filter],
        next_token: Option<&str>,
    ) -> Result<Page, CloudError>;

    async fn describe_security_groups(
        &self,
        filters: &[Filter],
        next_token: Option<&str>,
    ) -> Result<Page, CloudError>;

    /// Fetch resources of `kind` by ID. Unknown IDs are simply absent from the result.
    async fn describe_by_id(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> Result<Vec<ResolvedRecord>, CloudError>;
}
