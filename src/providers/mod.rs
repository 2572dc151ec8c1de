//! Subnet and security group providers
//!
//! A provider turns a NodeTemplate's selector into resolved records, serving
//! from the [`SelectorCache`] when it can and draining the inventory API when
//! it cannot.

mod cache;
mod security_group;
mod subnet;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

pub use cache::{CacheConfig, CacheEntry, SelectorCache};
pub use security_group::SecurityGroupProvider;
pub use subnet::SubnetProvider;

use crate::cloud::{CloudError, Filter, InventoryApi, Page};
use crate::crd::NodeTemplate;
use crate::error::Result;
use crate::record::{ResolvedRecord, ResourceKind};
use crate::selector::{self, Selector, SelectorQuery};

/// Resolves one kind of cloud resource for a NodeTemplate
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// The selector this provider reads from the template
    fn selector(&self, template: &NodeTemplate) -> Selector;

    fn cache(&self) -> &SelectorCache;

    /// Evict the cached resolution of the template's selector
    fn invalidate(&self, template: &NodeTemplate) {
        self.cache().invalidate(self.kind(), &self.selector(template));
    }

    /// Resolved records for the template, sorted by ID
    async fn list(&self, template: &NodeTemplate) -> Result<Vec<ResolvedRecord>>;

    /// Just the IDs, backed by the same cache as [`Provider::list`]
    async fn list_ids(&self, template: &NodeTemplate) -> Result<Vec<String>> {
        Ok(self
            .list(template)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }
}

/// Cache-then-network resolution shared by both providers
#[instrument(skip(inventory, cache, selector), fields(kind = %kind))]
pub(crate) async fn resolve_cached(
    inventory: &dyn InventoryApi,
    cache: &SelectorCache,
    kind: ResourceKind,
    selector: &Selector,
) -> Result<Arc<Vec<ResolvedRecord>>> {
    selector.validate()?;

    if let Some(entry) = cache.get(kind, selector) {
        debug!("Cache hit for {} selector {}", kind, selector.canonical());
        #[cfg(feature = "metrics")]
        crate::controller::metrics::inc_cache_request(kind.as_str(), true);
        return Ok(entry.records);
    }
    debug!("Cache miss for {} selector {}", kind, selector.canonical());
    #[cfg(feature = "metrics")]
    crate::controller::metrics::inc_cache_request(kind.as_str(), false);

    // Capture before fetching so an invalidation during the fetch fences the result
    let generation = cache.generation();

    let candidates = match selector.query() {
        SelectorQuery::Nothing => Vec::new(),
        SelectorQuery::Ids(ids) => {
            let result = inventory.describe_by_id(kind, &ids).await;
            #[cfg(feature = "metrics")]
            crate::controller::metrics::inc_inventory_request(
                kind.as_str(),
                "describe_by_id",
                result.is_ok(),
            );
            result?
        }
        SelectorQuery::Tags(_) => drain_pages(inventory, kind, &selector.filters()).await?,
    };

    let records = Arc::new(selector::resolve(selector, candidates));
    cache.insert(kind, selector, Arc::clone(&records), generation);
    Ok(records)
}

/// Follow continuation tokens until the last page
async fn drain_pages(
    inventory: &dyn InventoryApi,
    kind: ResourceKind,
    filters: &[Filter],
) -> std::result::Result<Vec<ResolvedRecord>, CloudError> {
    let mut records = Vec::new();
    let mut token: Option<String> = None;
    let mut seen = HashSet::new();
    let mut pages = 0usize;

    loop {
        let result = fetch_page(inventory, kind, filters, token.as_deref()).await;
        #[cfg(feature = "metrics")]
        crate::controller::metrics::inc_inventory_request(kind.as_str(), "describe", result.is_ok());
        let page = result?;
        pages += 1;
        records.extend(page.records);

        match page.next_token {
            Some(next) if seen.insert(next.clone()) => token = Some(next),
            Some(next) => {
                return Err(CloudError::Malformed(format!(
                    "inventory API repeated continuation token {}",
                    next
                )))
            }
            None => break,
        }
    }

    debug!(
        "Drained {} page(s) with {} {} candidate(s)",
        pages,
        records.len(),
        kind
    );
    Ok(records)
}

async fn fetch_page(
    inventory: &dyn InventoryApi,
    kind: ResourceKind,
    filters: &[Filter],
    token: Option<&str>,
) -> std::result::Result<Page, CloudError> {
    match kind {
        ResourceKind::Subnet => inventory.describe_subnets(filters, token).await,
        ResourceKind::SecurityGroup => inventory.describe_security_groups(filters, token).await,
    }
}
