//! Requeue timing for reconcile outcomes

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use kube::runtime::controller::Action;

use super::reconciler::ReconcileOutcome;
use crate::config::RequeueConfig;
use crate::error::Error;

/// Calculate exponential backoff delay for retry attempts
///
/// # Arguments
/// * `attempt` - Current retry attempt number (0-indexed)
/// * `base` - Delay for the first retry
/// * `max` - Maximum delay cap
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    // Exponential: base * 2^attempt, capped at max
    let factor = 2_u32.saturating_pow(attempt.min(16));
    base.saturating_mul(factor).min(max)
}

/// Consecutive transient failures per NodeTemplate
#[derive(Default)]
pub struct FailureTracker {
    attempts: Mutex<HashMap<String, u32>>,
}

impl FailureTracker {
    /// Record a failure and return how many failures preceded it
    pub fn record_failure(&self, name: &str) -> u32 {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let count = attempts.entry(name.to_string()).or_insert(0);
        let previous = *count;
        *count = count.saturating_add(1);
        previous
    }

    pub fn reset(&self, name: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }

    pub fn failures(&self, name: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

/// Maps reconcile outcomes to controller actions
#[derive(Default)]
pub struct RequeuePolicy {
    config: RequeueConfig,
    failures: FailureTracker,
}

impl RequeuePolicy {
    pub fn new(config: RequeueConfig) -> Self {
        Self {
            config,
            failures: FailureTracker::default(),
        }
    }

    pub fn config(&self) -> &RequeueConfig {
        &self.config
    }

    pub fn failures(&self, name: &str) -> u32 {
        self.failures.failures(name)
    }

    fn backoff(&self, name: &str) -> Duration {
        let attempt = self.failures.record_failure(name);
        calculate_backoff(attempt, self.config.backoff_base, self.config.backoff_max)
    }

    pub fn action_for(&self, name: &str, outcome: &ReconcileOutcome) -> Action {
        match outcome {
            ReconcileOutcome::Succeeded => {
                self.failures.reset(name);
                Action::requeue(self.config.resync_interval)
            }
            ReconcileOutcome::NotFound => {
                self.failures.reset(name);
                Action::await_change()
            }
            ReconcileOutcome::TransientFailure { .. } => Action::requeue(self.backoff(name)),
            // Only a spec change can fix a malformed selector
            ReconcileOutcome::TerminalFailure { .. } => {
                self.failures.reset(name);
                Action::await_change()
            }
        }
    }

    /// Action for a reconcile that returned an error instead of an outcome
    pub fn action_for_error(&self, name: &str, error: &Error) -> Action {
        if error.is_retriable() {
            Action::requeue(self.backoff(name))
        } else {
            Action::requeue(self.config.resync_interval)
        }
    }
}
