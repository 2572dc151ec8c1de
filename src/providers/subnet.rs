//! Subnet provider

use std::sync::Arc;

use async_trait::async_trait;

use super::{resolve_cached, Provider, SelectorCache};
use crate::cloud::InventoryApi;
use crate::crd::NodeTemplate;
use crate::error::Result;
use crate::record::{ResolvedRecord, ResourceKind};
use crate::selector::Selector;

#[derive(Clone)]
pub struct SubnetProvider {
    inventory: Arc<dyn InventoryApi>,
    cache: Arc<SelectorCache>,
}

impl SubnetProvider {
    pub fn new(inventory: Arc<dyn InventoryApi>, cache: Arc<SelectorCache>) -> Self {
        Self { inventory, cache }
    }

    /// Resolve an arbitrary subnet selector
    pub async fn list_for_selector(&self, selector: &Selector) -> Result<Vec<ResolvedRecord>> {
        let records = resolve_cached(
            self.inventory.as_ref(),
            &self.cache,
            ResourceKind::Subnet,
            selector,
        )
        .await?;
        Ok(records.as_ref().clone())
    }
}

#[async_trait]
impl Provider for SubnetProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Subnet
    }

    fn selector(&self, template: &NodeTemplate) -> Selector {
        template.spec.subnet_selector()
    }

    fn cache(&self) -> &SelectorCache {
        &self.cache
    }

    async fn list(&self, template: &NodeTemplate) -> Result<Vec<ResolvedRecord>> {
        self.list_for_selector(&self.selector(template)).await
    }
}
