//! Selector resolution cache shared by the providers
//!
//! Entries are keyed by `(ResourceKind, selector fingerprint)` and expire after
//! the configured TTL. Only successful resolutions are stored, so a failed
//! fetch never replaces a valid entry. Every entry is tagged with the cache
//! generation it was fetched at and is only served while that generation is
//! current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;

use crate::record::{ResolvedRecord, ResourceKind};
use crate::selector::Selector;

type CacheKey = (ResourceKind, String);

/// Cache configuration
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Maximum number of cached selector fingerprints
    pub max_capacity: u64,
    /// Time to live for entries
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1024,
            ttl: Duration::from_secs(60),
        }
    }
}

/// A resolved record set and the generation it was fetched at
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub records: Arc<Vec<ResolvedRecord>>,
    pub generation: u64,
}

/// TTL + generation cache of selector resolutions
pub struct SelectorCache {
    entries: Option<Cache<CacheKey, CacheEntry>>,
    generation: AtomicU64,
}

impl SelectorCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Some(
                Cache::builder()
                    .max_capacity(config.max_capacity)
                    .time_to_live(config.ttl)
                    .build(),
            ),
            generation: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            entries: None,
            generation: AtomicU64::new(0),
        }
    }

    fn key(kind: ResourceKind, selector: &Selector) -> CacheKey {
        (kind, selector.fingerprint())
    }

    pub fn get(&self, kind: ResourceKind, selector: &Selector) -> Option<CacheEntry> {
        let entries = self.entries.as_ref()?;
        let key = Self::key(kind, selector);
        let entry = entries.get(&key)?;
        // A write that raced invalidate_all can land after moka's cut-off
        if entry.generation != self.generation() {
            entries.invalidate(&key);
            return None;
        }
        Some(entry)
    }

    /// Current generation. Capture it before fetching and hand it back to [`Self::insert`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store a successful resolution fetched at `generation`.
    ///
    /// Returns `false` without storing when the cache was invalidated after the
    /// fetch started.
    pub fn insert(
        &self,
        kind: ResourceKind,
        selector: &Selector,
        records: Arc<Vec<ResolvedRecord>>,
        generation: u64,
    ) -> bool {
        let Some(entries) = self.entries.as_ref() else {
            return false;
        };
        if self.generation() != generation {
            debug!(
                "Dropping {} resolution fetched at generation {}, cache was invalidated",
                kind, generation
            );
            return false;
        }
        entries.insert(
            Self::key(kind, selector),
            CacheEntry {
                records,
                generation,
            },
        );
        true
    }

    /// Pre-seed an entry at the current generation
    pub fn seed(&self, kind: ResourceKind, selector: &Selector, records: Vec<ResolvedRecord>) {
        self.insert(kind, selector, Arc::new(records), self.generation());
    }

    pub fn invalidate(&self, kind: ResourceKind, selector: &Selector) {
        if let Some(entries) = self.entries.as_ref() {
            entries.invalidate(&Self::key(kind, selector));
        }
    }

    /// Drop every entry and fence off fetches that are still in flight
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(entries) = self.entries.as_ref() {
            entries.invalidate_all();
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.entries
            .as_ref()
            .map(|entries| {
                entries.run_pending_tasks();
                entries.entry_count()
            })
            .unwrap_or(0)
    }
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(ids: &[&str]) -> Vec<ResolvedRecord> {
        ids.iter().map(|id| ResolvedRecord::new(*id)).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = SelectorCache::default();
        let selector = Selector::new([("env", "prod")]);
        cache.seed(ResourceKind::Subnet, &selector, records(&["subnet-1"]));

        let entry = cache.get(ResourceKind::Subnet, &selector).unwrap();
        assert_eq!(entry.records.len(), 1);
        assert!(cache.get(ResourceKind::SecurityGroup, &selector).is_none());
    }

    #[test]
    fn test_equivalent_selectors_share_entry() {
        let cache = SelectorCache::default();
        let a = Selector::new([("env", "prod"), ("tier", "private")]);
        let b = Selector::new([("tier", "private"), ("env", "prod")]);
        cache.seed(ResourceKind::Subnet, &a, records(&["subnet-1"]));
        assert!(cache.get(ResourceKind::Subnet, &b).is_some());
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = SelectorCache::new(CacheConfig {
            max_capacity: 16,
            ttl: Duration::from_millis(50),
        });
        let selector = Selector::new([("*", "*")]);
        cache.seed(ResourceKind::SecurityGroup, &selector, records(&["sg-1"]));
        assert!(cache.get(ResourceKind::SecurityGroup, &selector).is_some());

        std::thread::sleep(Duration::from_millis(150));
        assert!(cache.get(ResourceKind::SecurityGroup, &selector).is_none());
    }

    #[test]
    fn test_stale_generation_is_not_committed() {
        let cache = SelectorCache::default();
        let selector = Selector::new([("*", "*")]);
        let generation = cache.generation();
        cache.invalidate_all();

        let stored = cache.insert(
            ResourceKind::Subnet,
            &selector,
            Arc::new(records(&["subnet-1"])),
            generation,
        );
        assert!(!stored);
        assert!(cache.get(ResourceKind::Subnet, &selector).is_none());
    }

    #[test]
    fn test_write_racing_invalidate_all_is_not_served() {
        let cache = SelectorCache::default();
        let selector = Selector::new([("*", "*")]);
        let generation = cache.generation();

        // The generation check passed, then invalidate_all ran before the write landed
        cache.invalidate_all();
        cache.entries.as_ref().unwrap().insert(
            SelectorCache::key(ResourceKind::Subnet, &selector),
            CacheEntry {
                records: Arc::new(records(&["subnet-1"])),
                generation,
            },
        );

        assert!(cache.get(ResourceKind::Subnet, &selector).is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_entries_survive_until_invalidated() {
        let cache = SelectorCache::default();
        let selector = Selector::new([("*", "*")]);
        cache.seed(ResourceKind::Subnet, &selector, records(&["subnet-1"]));
        assert_eq!(
            cache.get(ResourceKind::Subnet, &selector).unwrap().generation,
            cache.generation()
        );

        cache.invalidate_all();
        cache.seed(ResourceKind::Subnet, &selector, records(&["subnet-2"]));
        let entry = cache.get(ResourceKind::Subnet, &selector).unwrap();
        assert_eq!(entry.records[0].id, "subnet-2");
    }

    #[test]
    fn test_invalidate_single_entry() {
        let cache = SelectorCache::default();
        let prod = Selector::new([("env", "prod")]);
        let dev = Selector::new([("env", "dev")]);
        cache.seed(ResourceKind::Subnet, &prod, records(&["subnet-1"]));
        cache.seed(ResourceKind::Subnet, &dev, records(&["subnet-2"]));

        cache.invalidate(ResourceKind::Subnet, &prod);
        assert!(cache.get(ResourceKind::Subnet, &prod).is_none());
        assert!(cache.get(ResourceKind::Subnet, &dev).is_some());
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = SelectorCache::disabled();
        let selector = Selector::new([("*", "*")]);
        cache.seed(ResourceKind::Subnet, &selector, records(&["subnet-1"]));
        assert!(cache.get(ResourceKind::Subnet, &selector).is_none());
        assert_eq!(cache.entry_count(), 0);
    }
}
