//! Prometheus metrics for the node template operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `nodetemplate_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `nodetemplate_reconcile_outcomes_total` (counter): reconcile passes labeled by outcome.
//! - `nodetemplate_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `nodetemplate_selector_cache_requests_total` (counter): cache lookups labeled by resource and result.
//! - `nodetemplate_inventory_requests_total` (counter): inventory API calls labeled by resource, operation and result.
//! - `nodetemplate_resolved_resources` (gauge): resolved IDs labeled by template and resource.
//!
//! prometheus-client appends the `_total` suffix to counters on encoding.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::record::ResourceKind;

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "nodetemplate"
    pub controller: String,
}

/// Labels for reconcile outcomes
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    /// "succeeded", "not_found", "transient_failure" or "terminal_failure"
    pub outcome: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Controller name, e.g. "nodetemplate"
    pub controller: String,
    /// Error kind/category, e.g. "kube", "cloud", "selector"
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheLabels {
    pub resource: String,
    /// "hit" or "miss"
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct InventoryLabels {
    pub resource: String,
    pub operation: String,
    /// "success" or "error"
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResolvedLabels {
    pub name: String,
    pub resource: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

pub static RECONCILE_OUTCOMES_TOTAL: Lazy<Family<OutcomeLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking selector cache hits and misses
pub static SELECTOR_CACHE_REQUESTS_TOTAL: Lazy<Family<CacheLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking inventory API requests, one per page
pub static INVENTORY_REQUESTS_TOTAL: Lazy<Family<InventoryLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Gauge tracking how many IDs the last successful resolution produced
pub static RESOLVED_RESOURCES: Lazy<Family<ResolvedLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "nodetemplate_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "nodetemplate_reconcile_outcomes",
        "Total number of reconcile passes by outcome",
        RECONCILE_OUTCOMES_TOTAL.clone(),
    );
    registry.register(
        "nodetemplate_reconcile_errors",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );

    registry.register(
        "nodetemplate_selector_cache_requests",
        "Total number of selector cache lookups",
        SELECTOR_CACHE_REQUESTS_TOTAL.clone(),
    );
    registry.register(
        "nodetemplate_inventory_requests",
        "Total number of inventory API requests",
        INVENTORY_REQUESTS_TOTAL.clone(),
    );
    registry.register(
        "nodetemplate_resolved_resources",
        "Number of resources resolved for a NodeTemplate",
        RESOLVED_RESOURCES.clone(),
    );

    registry
});

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    let labels = ReconcileLabels {
        controller: controller.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

pub fn inc_reconcile_outcome(outcome: &str) {
    let labels = OutcomeLabels {
        outcome: outcome.to_string(),
    };
    RECONCILE_OUTCOMES_TOTAL.get_or_create(&labels).inc();
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(controller: &str, kind: &str) {
    let labels = ErrorLabels {
        controller: controller.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_cache_request(resource: &str, hit: bool) {
    let labels = CacheLabels {
        resource: resource.to_string(),
        result: if hit { "hit" } else { "miss" }.to_string(),
    };
    SELECTOR_CACHE_REQUESTS_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_inventory_request(resource: &str, operation: &str, ok: bool) {
    let labels = InventoryLabels {
        resource: resource.to_string(),
        operation: operation.to_string(),
        result: if ok { "success" } else { "error" }.to_string(),
    };
    INVENTORY_REQUESTS_TOTAL.get_or_create(&labels).inc();
}

/// Set the resolved resource gauge for a template
pub fn set_resolved_resources(name: &str, resource: &str, count: i64) {
    let labels = ResolvedLabels {
        name: name.to_string(),
        resource: resource.to_string(),
    };
    RESOLVED_RESOURCES.get_or_create(&labels).set(count);
}

/// Drop the resolved resource gauges of a template that no longer exists
pub fn remove_resolved_resources(name: &str) {
    for kind in [ResourceKind::Subnet, ResourceKind::SecurityGroup] {
        RESOLVED_RESOURCES.remove(&ResolvedLabels {
            name: name.to_string(),
            resource: kind.as_str().to_string(),
        });
    }
}
