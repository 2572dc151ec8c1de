//! In-memory inventory used by unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CloudError, Filter, InventoryApi, Page};
use crate::record::{ResolvedRecord, ResourceKind};

/// Serves fixed records in pages and counts every call.
///
/// Filters are recorded but not applied, so the resolver does all matching.
pub struct FakeInventory {
    subnets: Mutex<Vec<ResolvedRecord>>,
    security_groups: Mutex<Vec<ResolvedRecord>>,
    page_size: usize,
    failures: Mutex<HashMap<ResourceKind, CloudError>>,
    latency: Mutex<Option<Duration>>,
    describe_calls: Mutex<HashMap<ResourceKind, usize>>,
    by_id_calls: AtomicUsize,
    filters_seen: Mutex<Vec<Vec<Filter>>>,
}

impl Default for FakeInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInventory {
    pub fn new() -> Self {
        Self {
            subnets: Mutex::new(Vec::new()),
            security_groups: Mutex::new(Vec::new()),
            page_size: 2,
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            describe_calls: Mutex::new(HashMap::new()),
            by_id_calls: AtomicUsize::new(0),
            filters_seen: Mutex::new(Vec::new()),
        }
    }

    /// Default inventory: three subnets in three zones and two security groups
    pub fn with_defaults() -> Self {
        let fake = Self::new();
        fake.set_subnets(vec![
            ResolvedRecord::new("subnet-test3")
                .with_zone("test-zone-1c")
                .with_tag("Name", "test-subnet-3")
                .with_tag("env", "dev"),
            ResolvedRecord::new("subnet-test1")
                .with_zone("test-zone-1a")
                .with_tag("Name", "test-subnet-1")
                .with_tag("env", "prod"),
            ResolvedRecord::new("subnet-test2")
                .with_zone("test-zone-1b")
                .with_tag("Name", "test-subnet-2")
                .with_tag("env", "prod"),
        ]);
        fake.set_security_groups(vec![
            ResolvedRecord::new("sg-test2").with_tag("Name", "securityGroup-test2"),
            ResolvedRecord::new("sg-test1").with_tag("Name", "securityGroup-test1"),
        ]);
        fake
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn set_subnets(&self, records: Vec<ResolvedRecord>) {
        *self.subnets.lock().unwrap() = records;
    }

    pub fn set_security_groups(&self, records: Vec<ResolvedRecord>) {
        *self.security_groups.lock().unwrap() = records;
    }

    /// Make every following call for `kind` fail with `error`
    pub fn fail(&self, kind: ResourceKind, error: CloudError) {
        self.failures.lock().unwrap().insert(kind, error);
    }

    pub fn recover(&self, kind: ResourceKind) {
        self.failures.lock().unwrap().remove(&kind);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Number of describe requests (pages) issued for `kind`
    pub fn describe_calls(&self, kind: ResourceKind) -> usize {
        self.describe_calls
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn by_id_calls(&self) -> usize {
        self.by_id_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.describe_calls(ResourceKind::Subnet)
            + self.describe_calls(ResourceKind::SecurityGroup)
            + self.by_id_calls()
    }

    pub fn filters_seen(&self) -> Vec<Vec<Filter>> {
        self.filters_seen.lock().unwrap().clone()
    }

    pub fn reset_counters(&self) {
        self.describe_calls.lock().unwrap().clear();
        self.by_id_calls.store(0, Ordering::SeqCst);
        self.filters_seen.lock().unwrap().clear();
    }

    fn records(&self, kind: ResourceKind) -> Vec<ResolvedRecord> {
        match kind {
            ResourceKind::Subnet => self.subnets.lock().unwrap().clone(),
            ResourceKind::SecurityGroup => self.security_groups.lock().unwrap().clone(),
        }
    }

    async fn before_call(&self, kind: ResourceKind) -> Result<(), CloudError> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.lock().unwrap().get(&kind) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn page(
        &self,
        kind: ResourceKind,
        filters: &[Filter],
        next_token: Option<&str>,
    ) -> Result<Page, CloudError> {
        *self.describe_calls.lock().unwrap().entry(kind).or_insert(0) += 1;
        self.filters_seen.lock().unwrap().push(filters.to_vec());
        self.before_call(kind).await?;

        let all = self.records(kind);
        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| CloudError::InvalidRequest(format!("bad token {}", token)))?,
            None => 0,
        };
        let end = (start + self.page_size).min(all.len());
        let records = all.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_token = (end < all.len()).then(|| end.to_string());
        Ok(Page {
            records,
            next_token,
        })
    }
}

#[async_trait]
impl InventoryApi for FakeInventory {
    async fn describe_subnets(
        &self,
        filters: &[Filter],
        next_token: Option<&str>,
    ) -> Result<Page, CloudError> {
        self.page(ResourceKind::Subnet, filters, next_token).await
    }

    async fn describe_security_groups(
        &self,
        filters: &[Filter],
        next_token: Option<&str>,
    ) -> Result<Page, CloudError> {
        self.page(ResourceKind::SecurityGroup, filters, next_token)
            .await
    }

    async fn describe_by_id(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> Result<Vec<ResolvedRecord>, CloudError> {
        self.by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call(kind).await?;
        Ok(self
            .records(kind)
            .into_iter()
            .filter(|r| ids.contains(&r.id))
            .collect())
    }
}
