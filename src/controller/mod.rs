//! Controller module for NodeTemplate reconciliation
//! This module contains the main controller loop, the reconciliation logic
//! and the requeue policy for NodeTemplates.

pub mod conditions;
#[cfg(test)]
pub(crate) mod fake_store;
#[cfg(feature = "metrics")]
pub mod metrics;
mod reconciler;
mod requeue;
mod store;

pub use reconciler::{run_controller, ControllerState, ReconcileOutcome, TemplateReconciler};
pub use requeue::{calculate_backoff, FailureTracker, RequeuePolicy};
pub use store::{KubeTemplateStore, TemplateStore, FIELD_MANAGER};
