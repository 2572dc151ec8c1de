//! Runtime configuration for the operator

use std::time::Duration;

use crate::cloud::InventoryClientConfig;
use crate::error::{Error, Result};
use crate::providers::CacheConfig;

/// Requeue timing for reconcile outcomes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequeueConfig {
    /// Requeue interval after a successful reconcile (drift correction)
    pub resync_interval: Duration,
    /// First transient-failure delay
    pub backoff_base: Duration,
    /// Transient-failure delay cap
    pub backoff_max: Duration,
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(300),
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

/// All tunables, assembled from CLI flags and environment variables
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub inventory: InventoryClientConfig,
    pub cache: CacheConfig,
    pub requeue: RequeueConfig,
    /// Bounded attempts for the status patch under conflicts
    pub patch_attempts: u32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            inventory: InventoryClientConfig::default(),
            cache: CacheConfig::default(),
            requeue: RequeueConfig::default(),
            patch_attempts: 3,
        }
    }
}

impl OperatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.inventory.endpoint.trim().is_empty() {
            return Err(Error::ConfigError(
                "inventory endpoint must not be empty".to_string(),
            ));
        }
        if self.inventory.page_size == 0 {
            return Err(Error::ConfigError("page size must be positive".to_string()));
        }
        if self.cache.ttl.is_zero() {
            return Err(Error::ConfigError("cache TTL must be positive".to_string()));
        }
        if self.patch_attempts == 0 {
            return Err(Error::ConfigError(
                "patch attempts must be at least 1".to_string(),
            ));
        }
        if self.requeue.backoff_base > self.requeue.backoff_max {
            return Err(Error::ConfigError(format!(
                "backoff base {:?} exceeds backoff max {:?}",
                self.requeue.backoff_base, self.requeue.backoff_max
            )));
        }
        Ok(())
    }
}
