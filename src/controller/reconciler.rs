//! Main reconciler for NodeTemplate resources
//!
//! Implements the controller pattern using kube-rs runtime. Each pass resolves
//! both selectors concurrently, writes the results into the status and decides
//! when to look again.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use super::conditions::{
    set_condition, CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY,
    REASON_CLOUD_API_ERROR, REASON_INVALID_SELECTOR, REASON_RESOLUTION_FAILED, REASON_RESOLVED,
};
use super::requeue::RequeuePolicy;
use super::store::TemplateStore;
use crate::crd::{NodeTemplate, NodeTemplateStatus, SecurityGroupStatus, SubnetStatus};
use crate::error::{Error, Result};
use crate::providers::{Provider, SecurityGroupProvider, SubnetProvider};
use crate::record::{ResolvedRecord, ResourceKind};

const CONTROLLER_NAME: &str = "nodetemplate";

/// Result of one reconciliation pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Both selectors resolved and the status is current
    Succeeded,
    /// The template no longer exists
    NotFound,
    /// A provider failed or the status patch kept conflicting; retry with backoff
    TransientFailure { reason: String },
    /// A selector is malformed; retrying cannot help
    TerminalFailure { reason: String },
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Succeeded => "succeeded",
            ReconcileOutcome::NotFound => "not_found",
            ReconcileOutcome::TransientFailure { .. } => "transient_failure",
            ReconcileOutcome::TerminalFailure { .. } => "terminal_failure",
        }
    }
}

/// Per-kind provider results for one pass
struct Resolution {
    subnets: Result<Vec<ResolvedRecord>>,
    security_groups: Result<Vec<ResolvedRecord>>,
}

impl Resolution {
    fn field(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::Subnet => "spec.subnetSelector",
            ResourceKind::SecurityGroup => "spec.securityGroupSelector",
        }
    }

    fn errors(&self) -> Vec<(ResourceKind, &Error)> {
        let mut errors = Vec::new();
        if let Err(e) = &self.subnets {
            errors.push((ResourceKind::Subnet, e));
        }
        if let Err(e) = &self.security_groups {
            errors.push((ResourceKind::SecurityGroup, e));
        }
        errors
    }

    fn error_summary(&self) -> String {
        self.errors()
            .iter()
            .map(|(kind, e)| format!("{}: {}", Self::field(*kind), e))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn outcome(&self) -> ReconcileOutcome {
        let errors = self.errors();
        if errors.is_empty() {
            return ReconcileOutcome::Succeeded;
        }
        // A retriable failure on one kind still deserves a retry even if the
        // other kind's selector is malformed
        if errors
            .iter()
            .all(|(_, e)| matches!(e, Error::Selector(_)))
        {
            ReconcileOutcome::TerminalFailure {
                reason: self.error_summary(),
            }
        } else {
            ReconcileOutcome::TransientFailure {
                reason: self.error_summary(),
            }
        }
    }

    /// Desired status given the template's current state.
    ///
    /// Kinds that failed keep whatever the current status already holds.
    fn desired_status(&self, template: &NodeTemplate) -> NodeTemplateStatus {
        let mut status = template.status.clone().unwrap_or_default();
        let generation = template.metadata.generation;

        if let Ok(records) = &self.subnets {
            status.subnets = records.iter().map(SubnetStatus::from).collect();
        }
        if let Ok(records) = &self.security_groups {
            status.security_groups = records.iter().map(SecurityGroupStatus::from).collect();
        }

        match self.outcome() {
            ReconcileOutcome::Succeeded => {
                status.observed_generation = generation;
                let message = format!(
                    "Resolved {} subnet(s) and {} security group(s)",
                    status.subnets.len(),
                    status.security_groups.len()
                );
                set_condition(
                    &mut status.conditions,
                    CONDITION_TYPE_READY,
                    CONDITION_STATUS_TRUE,
                    REASON_RESOLVED,
                    &message,
                    generation,
                );
            }
            ReconcileOutcome::TerminalFailure { reason } => set_condition(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                CONDITION_STATUS_FALSE,
                REASON_INVALID_SELECTOR,
                &reason,
                generation,
            ),
            ReconcileOutcome::TransientFailure { reason } => set_condition(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                CONDITION_STATUS_FALSE,
                REASON_RESOLUTION_FAILED,
                &reason,
                generation,
            ),
            ReconcileOutcome::NotFound => {}
        }

        status
    }
}

/// Brings a NodeTemplate's status in line with the cloud inventory
pub struct TemplateReconciler {
    store: Arc<dyn TemplateStore>,
    subnets: SubnetProvider,
    security_groups: SecurityGroupProvider,
    patch_attempts: u32,
}

impl TemplateReconciler {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        subnets: SubnetProvider,
        security_groups: SecurityGroupProvider,
        patch_attempts: u32,
    ) -> Self {
        Self {
            store,
            subnets,
            security_groups,
            patch_attempts: patch_attempts.max(1),
        }
    }

    /// Run one reconciliation pass for the template called `name`.
    ///
    /// `Err` is only returned when the object store itself fails; everything
    /// else is classified into a [`ReconcileOutcome`].
    #[instrument(skip(self))]
    pub async fn reconcile(&self, name: &str) -> Result<ReconcileOutcome> {
        let Some(template) = self.store.get(name).await? else {
            debug!("NodeTemplate {} not found, nothing to do", name);
            forget(name);
            return Ok(ReconcileOutcome::NotFound);
        };

        info!("Reconciling NodeTemplate {}", name);

        // An edited spec is resolved against fresh inventory data
        if spec_changed(&template) {
            debug!("Spec of {} changed, invalidating cached resolutions", name);
            self.subnets.invalidate(&template);
            self.security_groups.invalidate(&template);
        }

        let (subnets, security_groups) = tokio::join!(
            self.subnets.list(&template),
            self.security_groups.list(&template)
        );
        let resolution = Resolution {
            subnets,
            security_groups,
        };

        for (kind, err) in resolution.errors() {
            warn!("Failed to resolve {} selector for {}: {}", kind, name, err);
        }

        if let Some(outcome) = self.patch_with_retry(name, template, &resolution).await? {
            if outcome == ReconcileOutcome::NotFound {
                forget(name);
            }
            return Ok(outcome);
        }

        #[cfg(feature = "metrics")]
        {
            if let Ok(records) = &resolution.subnets {
                super::metrics::set_resolved_resources(
                    name,
                    ResourceKind::Subnet.as_str(),
                    records.len() as i64,
                );
            }
            if let Ok(records) = &resolution.security_groups {
                super::metrics::set_resolved_resources(
                    name,
                    ResourceKind::SecurityGroup.as_str(),
                    records.len() as i64,
                );
            }
        }

        let outcome = resolution.outcome();
        info!("NodeTemplate {} reconciled: {}", name, outcome.as_str());
        Ok(outcome)
    }

    /// Patch the status, re-reading the template on conflicts.
    ///
    /// Returns `Some(outcome)` when the pass must end early.
    async fn patch_with_retry(
        &self,
        name: &str,
        template: NodeTemplate,
        resolution: &Resolution,
    ) -> Result<Option<ReconcileOutcome>> {
        let generation = template.metadata.generation;
        let mut current = template;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let desired = resolution.desired_status(&current);

            if current.status.as_ref() == Some(&desired) {
                debug!("Status of {} already up to date", name);
                break;
            }

            match self.store.patch_status(&current, &desired).await {
                Ok(_) => {
                    debug!("Patched status of {} on attempt {}", name, attempt);
                    self.record_failure_events(&current, resolution).await;
                    break;
                }
                Err(Error::Conflict(msg)) if attempt < self.patch_attempts => {
                    debug!(
                        "Status patch for {} conflicted (attempt {}/{}): {}",
                        name, attempt, self.patch_attempts, msg
                    );
                    match self.store.get(name).await? {
                        Some(latest) if latest.metadata.generation != generation => {
                            // The selectors may have changed; start over with a fresh pass
                            return Ok(Some(ReconcileOutcome::TransientFailure {
                                reason: format!("{} changed during reconciliation", name),
                            }));
                        }
                        Some(latest) => current = latest,
                        None => return Ok(Some(ReconcileOutcome::NotFound)),
                    }
                }
                Err(Error::NotFound(_)) => {
                    debug!("NodeTemplate {} was deleted before its status was written", name);
                    return Ok(Some(ReconcileOutcome::NotFound));
                }
                Err(Error::Conflict(msg)) => {
                    warn!(
                        "Giving up on status patch for {} after {} conflicts",
                        name, attempt
                    );
                    return Ok(Some(ReconcileOutcome::TransientFailure {
                        reason: format!(
                            "status patch conflicted {} time(s): {}",
                            attempt, msg
                        ),
                    }));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Surface failures that need operator attention as Warning events
    async fn record_failure_events(&self, template: &NodeTemplate, resolution: &Resolution) {
        for (kind, err) in resolution.errors() {
            let reason = match err {
                Error::Selector(_) => REASON_INVALID_SELECTOR,
                Error::Cloud(e) if !e.is_retriable() => REASON_CLOUD_API_ERROR,
                _ => continue,
            };
            let message = format!("{}: {}", Resolution::field(kind), err);
            if let Err(e) = self
                .store
                .record_event(template, "Warning", reason, &message)
                .await
            {
                warn!(
                    "Failed to record {} event for {}: {}",
                    reason,
                    template.name_any(),
                    e
                );
            }
        }
    }
}

/// Whether the spec moved past the generation the status was last resolved for
fn spec_changed(template: &NodeTemplate) -> bool {
    match template.status.as_ref().and_then(|s| s.observed_generation) {
        Some(observed) => template.metadata.generation != Some(observed),
        None => false,
    }
}

/// Drop per-template state of a deleted template
fn forget(name: &str) {
    #[cfg(feature = "metrics")]
    super::metrics::remove_resolved_resources(name);
    #[cfg(not(feature = "metrics"))]
    let _ = name;
}

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub reconciler: TemplateReconciler,
    pub requeue: RequeuePolicy,
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let templates: Api<NodeTemplate> = Api::all(state.client.clone());

    info!("Starting NodeTemplate controller");

    // Verify CRD exists
    match templates.list(&Default::default()).await {
        Ok(_) => info!("NodeTemplate CRD is available"),
        Err(e) => {
            error!(
                "NodeTemplate CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "NodeTemplate CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(templates, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

/// The controller callback
///
/// This function is called whenever:
/// - A NodeTemplate is created, updated, or deleted
/// - The requeue timer expires
#[instrument(skip(obj, ctx), fields(name = %obj.name_any()))]
async fn reconcile(obj: Arc<NodeTemplate>, ctx: Arc<ControllerState>) -> Result<Action> {
    let name = obj.name_any();
    let started = Instant::now();

    let result = ctx.reconciler.reconcile(&name).await;

    #[cfg(feature = "metrics")]
    {
        super::metrics::observe_reconcile_duration_seconds(
            CONTROLLER_NAME,
            started.elapsed().as_secs_f64(),
        );
        if let Ok(outcome) = &result {
            super::metrics::inc_reconcile_outcome(outcome.as_str());
        }
    }
    #[cfg(not(feature = "metrics"))]
    let _ = started;

    let outcome = result?;
    let action = ctx.requeue.action_for(&name, &outcome);
    debug!("NodeTemplate {} next action: {:?}", name, action);
    Ok(action)
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(template: Arc<NodeTemplate>, error: &Error, ctx: Arc<ControllerState>) -> Action {
    error!(
        "Reconciliation error for {}: {:?}",
        template.name_any(),
        error
    );

    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(CONTROLLER_NAME, error.kind());

    ctx.requeue.action_for_error(&template.name_any(), error)
}
