//! Object store seam for NodeTemplates
//!
//! The reconciler reads templates and patches their status through
//! [`TemplateStore`]; [`KubeTemplateStore`] backs it with the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Event;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{
    api::{Api, Patch, PatchParams, PostParams},
    client::Client,
    Resource, ResourceExt,
};
use serde_json::json;

use crate::crd::{NodeTemplate, NodeTemplateStatus};
use crate::error::{Error, Result};

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "node-template-operator";

/// Namespace events are recorded in; NodeTemplates are cluster-scoped
const EVENT_NAMESPACE: &str = "default";

/// Read/patch access to NodeTemplate objects
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// `Ok(None)` when the template does not exist
    async fn get(&self, name: &str) -> Result<Option<NodeTemplate>>;

    /// Replace the status of `template`.
    ///
    /// Fails with [`Error::Conflict`] when `template` carries a stale resource version
    /// and with [`Error::NotFound`] when the template was deleted.
    async fn patch_status(
        &self,
        template: &NodeTemplate,
        status: &NodeTemplateStatus,
    ) -> Result<NodeTemplate>;

    /// Record a Kubernetes Event against the template
    async fn record_event(
        &self,
        template: &NodeTemplate,
        event_type: &str,
        reason: &str,
        message: &str,
    ) -> Result<()>;
}

/// [`TemplateStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeTemplateStore {
    client: Client,
    api: Api<NodeTemplate>,
}

impl KubeTemplateStore {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client.clone()),
            client,
        }
    }
}

#[async_trait]
impl TemplateStore for KubeTemplateStore {
    async fn get(&self, name: &str) -> Result<Option<NodeTemplate>> {
        self.api.get_opt(name).await.map_err(Error::KubeError)
    }

    async fn patch_status(
        &self,
        template: &NodeTemplate,
        status: &NodeTemplateStatus,
    ) -> Result<NodeTemplate> {
        // Carrying the resourceVersion turns the merge patch into a compare-and-swap
        let patch = json!({
            "metadata": { "resourceVersion": template.resource_version() },
            "status": status,
        });

        match self
            .api
            .patch_status(
                &template.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(updated) => Ok(updated),
            Err(e) => Err(patch_error(e)),
        }
    }

    async fn record_event(
        &self,
        template: &NodeTemplate,
        event_type: &str,
        reason: &str,
        message: &str,
    ) -> Result<()> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), EVENT_NAMESPACE);

        let time = chrono::Utc::now();
        let event = Event {
            metadata: kube::api::ObjectMeta {
                generate_name: Some(format!("{}-event-", template.name_any())),
                ..Default::default()
            },
            type_: Some(event_type.to_string()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            involved_object: template.object_ref(&()),
            first_timestamp: Some(Time(time)),
            last_timestamp: Some(Time(time)),
            count: Some(1),
            ..Default::default()
        };

        events
            .create(&PostParams::default(), &event)
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }
}

fn patch_error(err: kube::Error) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 409 => Error::Conflict(resp.message),
        kube::Error::Api(resp) if resp.code == 404 => Error::NotFound(resp.message),
        e => Error::KubeError(e),
    }
}
