//! In-memory [`TemplateStore`] for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use super::store::TemplateStore;
use crate::crd::{NodeTemplate, NodeTemplateSpec, NodeTemplateStatus};
use crate::error::{Error, Result};

/// An event recorded through the fake store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub name: String,
    pub event_type: String,
    pub reason: String,
    pub message: String,
}

#[derive(Default)]
pub struct FakeTemplateStore {
    templates: Mutex<HashMap<String, NodeTemplate>>,
    resource_version: AtomicU32,
    pending_conflicts: AtomicU32,
    bump_generation_on_conflict: Mutex<bool>,
    delete_before_patch: Mutex<bool>,
    patch_calls: AtomicUsize,
    events: Mutex<Vec<RecordedEvent>>,
}

impl FakeTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Insert or replace a template, assigning a fresh resource version
    pub fn put(&self, mut template: NodeTemplate) {
        template.metadata.resource_version = Some(self.next_version());
        if template.metadata.generation.is_none() {
            template.metadata.generation = Some(1);
        }
        self.templates
            .lock()
            .unwrap()
            .insert(template.name_any(), template);
    }

    /// Insert a template built from `spec` at generation 1
    pub fn create(&self, name: &str, spec: NodeTemplateSpec) {
        self.put(NodeTemplate {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                generation: Some(1),
                uid: Some(format!("test-uid-{}", name)),
                ..Default::default()
            },
            spec,
            status: None,
        });
    }

    pub fn remove(&self, name: &str) {
        self.templates.lock().unwrap().remove(name);
    }

    /// Change the spec and bump the generation, as the API server would
    pub fn update_spec(&self, name: &str, spec: NodeTemplateSpec) {
        let mut templates = self.templates.lock().unwrap();
        if let Some(template) = templates.get_mut(name) {
            template.spec = spec;
            template.metadata.generation = template.metadata.generation.map(|g| g + 1);
            template.metadata.resource_version = Some(self.next_version());
        }
    }

    /// Fail the next `count` status patches with a conflict, as if another
    /// writer updated the object in between
    pub fn conflict_next(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make the simulated concurrent writer change the spec as well
    pub fn bump_generation_on_conflict(&self) {
        *self.bump_generation_on_conflict.lock().unwrap() = true;
    }

    /// Delete the template right before the next status patch lands, as a
    /// concurrent `kubectl delete` would
    pub fn delete_before_next_patch(&self) {
        *self.delete_before_patch.lock().unwrap() = true;
    }

    pub fn status(&self, name: &str) -> Option<NodeTemplateStatus> {
        self.templates
            .lock()
            .unwrap()
            .get(name)
            .and_then(|t| t.status.clone())
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateStore for FakeTemplateStore {
    async fn get(&self, name: &str) -> Result<Option<NodeTemplate>> {
        Ok(self.templates.lock().unwrap().get(name).cloned())
    }

    async fn patch_status(
        &self,
        template: &NodeTemplate,
        status: &NodeTemplateStatus,
    ) -> Result<NodeTemplate> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        let name = template.name_any();
        let mut templates = self.templates.lock().unwrap();
        if std::mem::take(&mut *self.delete_before_patch.lock().unwrap()) {
            templates.remove(&name);
        }
        let stored = templates
            .get_mut(&name)
            .ok_or_else(|| Error::NotFound(format!("nodetemplates {} not found", name)))?;

        let pending = self.pending_conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.pending_conflicts.store(pending - 1, Ordering::SeqCst);
            stored.metadata.resource_version = Some(self.next_version());
            if *self.bump_generation_on_conflict.lock().unwrap() {
                stored.metadata.generation = stored.metadata.generation.map(|g| g + 1);
            }
            return Err(Error::Conflict(format!(
                "the object {} has been modified",
                name
            )));
        }

        if stored.metadata.resource_version != template.metadata.resource_version {
            return Err(Error::Conflict(format!(
                "stale resourceVersion for {}",
                name
            )));
        }

        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(self.next_version());
        Ok(stored.clone())
    }

    async fn record_event(
        &self,
        template: &NodeTemplate,
        event_type: &str,
        reason: &str,
        message: &str,
    ) -> Result<()> {
        self.events.lock().unwrap().push(RecordedEvent {
            name: template.name_any(),
            event_type: event_type.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
