//! In-memory cluster for exercising scenarios without an API server
//!
//! Every read can be scripted per resource: hidden for a number of reads,
//! failing with a transient error, or walking through a sequence of object
//! states. Deletes can linger to imitate finalizers. Reactions let a test
//! play the part of the reconciler: "when this object is created, make those
//! objects appear".

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::accessor::{CreateOutcome, DeleteOutcome, ResourceAccessor, ResourceMutator};
use crate::manifest::ManifestApplier;
use crate::resource::ResourceRef;
use crate::status::{observe_application, ApplicationStatus, ApplicationStatusProvider};
use crate::{Error, Result};

type Reaction = Arc<dyn Fn(&FakeCluster) + Send + Sync>;

#[derive(Debug, Clone)]
enum Step {
    Hidden,
    Fail(String),
    Present(Value),
}

#[derive(Default)]
struct State {
    objects: HashMap<ResourceRef, Value>,
    scripts: HashMap<ResourceRef, VecDeque<Step>>,
    lingering: HashMap<ResourceRef, u32>,
    linger_on_delete: HashMap<ResourceRef, u32>,
    failing_deletes: HashMap<ResourceRef, u32>,
    reads: HashMap<ResourceRef, u32>,
    created: Vec<ResourceRef>,
    deleted: Vec<ResourceRef>,
    patches: Vec<(ResourceRef, Value)>,
    applied: Vec<PathBuf>,
    relocations: Vec<(PathBuf, String)>,
    on_create: HashMap<ResourceRef, Vec<Reaction>>,
    on_patch: HashMap<ResourceRef, Vec<Reaction>>,
    on_apply: HashMap<String, Vec<Reaction>>,
}

/// Scriptable in-memory store implementing every engine seam
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    /// Empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not poison every later assertion
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store (or replace) an object
    pub fn insert(&self, target: &ResourceRef, object: Value) {
        let mut state = self.state();
        state.lingering.remove(target);
        state.objects.insert(target.clone(), object);
    }

    /// Drop an object immediately, bypassing finalizers
    pub fn remove(&self, target: &ResourceRef) {
        let mut state = self.state();
        state.objects.remove(target);
        state.lingering.remove(target);
    }

    /// Current stored object, ignoring any script
    pub fn get(&self, target: &ResourceRef) -> Option<Value> {
        self.state().objects.get(target).cloned()
    }

    /// Whether an object is stored, ignoring any script
    pub fn contains(&self, target: &ResourceRef) -> bool {
        self.state().objects.contains_key(target)
    }

    /// The next `reads` reads of `target` report not found
    pub fn appear_after(&self, target: &ResourceRef, reads: u32) {
        self.push_steps(target, (0..reads).map(|_| Step::Hidden));
    }

    /// The next `reads` reads of `target` fail with `message`
    pub fn fail_next(&self, target: &ResourceRef, reads: u32, message: &str) {
        self.push_steps(target, (0..reads).map(|_| Step::Fail(message.to_string())));
    }

    /// Walk `target` through a sequence of states, one per read.
    ///
    /// `None` reads as not found; `Some` is stored and returned. Once the
    /// sequence is exhausted the last stored object stays visible.
    pub fn script_values(&self, target: &ResourceRef, states: Vec<Option<Value>>) {
        self.push_steps(
            target,
            states.into_iter().map(|s| match s {
                Some(v) => Step::Present(v),
                None => Step::Hidden,
            }),
        );
    }

    fn push_steps(&self, target: &ResourceRef, steps: impl Iterator<Item = Step>) {
        self.state()
            .scripts
            .entry(target.clone())
            .or_default()
            .extend(steps);
    }

    /// After a delete request, keep `target` visible for `reads` more reads
    pub fn linger_on_delete(&self, target: &ResourceRef, reads: u32) {
        self.state()
            .linger_on_delete
            .insert(target.clone(), reads);
    }

    /// The next `times` delete requests for `target` fail
    pub fn fail_deletes(&self, target: &ResourceRef, times: u32) {
        self.state().failing_deletes.insert(target.clone(), times);
    }

    /// How many times `target` has been read
    pub fn reads(&self, target: &ResourceRef) -> u32 {
        self.state().reads.get(target).copied().unwrap_or(0)
    }

    /// Create requests that actually created something, in order
    pub fn created(&self) -> Vec<ResourceRef> {
        self.state().created.clone()
    }

    /// Accepted delete requests, in order
    pub fn deleted(&self) -> Vec<ResourceRef> {
        self.state().deleted.clone()
    }

    /// Merge patches received, in order
    pub fn patches(&self) -> Vec<(ResourceRef, Value)> {
        self.state().patches.clone()
    }

    /// Manifest paths applied, in order
    pub fn applied(&self) -> Vec<PathBuf> {
        self.state().applied.clone()
    }

    /// Manifests applied with [`ManifestApplier::apply_in`] and their target namespace
    pub fn relocations(&self) -> Vec<(PathBuf, String)> {
        self.state().relocations.clone()
    }

    /// Run `reaction` after every successful create of `target`
    pub fn on_create<F>(&self, target: &ResourceRef, reaction: F)
    where
        F: Fn(&FakeCluster) + Send + Sync + 'static,
    {
        self.state()
            .on_create
            .entry(target.clone())
            .or_default()
            .push(Arc::new(reaction));
    }

    /// Run `reaction` after every merge patch of `target`
    pub fn on_patch<F>(&self, target: &ResourceRef, reaction: F)
    where
        F: Fn(&FakeCluster) + Send + Sync + 'static,
    {
        self.state()
            .on_patch
            .entry(target.clone())
            .or_default()
            .push(Arc::new(reaction));
    }

    /// Run `reaction` after a manifest whose file name is `file_name` is applied
    pub fn on_apply<F>(&self, file_name: &str, reaction: F)
    where
        F: Fn(&FakeCluster) + Send + Sync + 'static,
    {
        self.state()
            .on_apply
            .entry(file_name.to_string())
            .or_default()
            .push(Arc::new(reaction));
    }

    // Reactions run with the lock released so they can call back in
    fn react(&self, reactions: Vec<Reaction>) {
        for reaction in reactions {
            reaction(self);
        }
    }
}

#[async_trait]
impl ResourceAccessor for FakeCluster {
    async fn read(&self, target: &ResourceRef) -> Result<Option<Value>> {
        let mut guard = self.state();
        let state = &mut *guard;
        *state.reads.entry(target.clone()).or_insert(0) += 1;

        let step = state.scripts.get_mut(target).and_then(VecDeque::pop_front);
        match step {
            Some(Step::Hidden) => return Ok(None),
            Some(Step::Fail(message)) => {
                return Err(Error::internal_with_context("fake read", message))
            }
            Some(Step::Present(object)) => {
                state.objects.insert(target.clone(), object.clone());
                return Ok(Some(object));
            }
            None => {}
        }

        if let Some(remaining) = state.lingering.get_mut(target) {
            if *remaining == 0 {
                state.lingering.remove(target);
                state.objects.remove(target);
                return Ok(None);
            }
            *remaining -= 1;
        }

        Ok(state.objects.get(target).cloned())
    }
}

#[async_trait]
impl ResourceMutator for FakeCluster {
    async fn create(&self, target: &ResourceRef, body: Value) -> Result<CreateOutcome> {
        let reactions = {
            let mut state = self.state();
            if state.objects.contains_key(target) && !state.lingering.contains_key(target) {
                return Ok(CreateOutcome::AlreadyExists);
            }
            state.lingering.remove(target);
            state.objects.insert(target.clone(), body);
            state.created.push(target.clone());
            state.on_create.get(target).cloned().unwrap_or_default()
        };
        self.react(reactions);
        Ok(CreateOutcome::Created)
    }

    async fn delete(&self, target: &ResourceRef) -> Result<DeleteOutcome> {
        let mut guard = self.state();
        let state = &mut *guard;
        if let Some(remaining) = state.failing_deletes.get_mut(target) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::internal_with_context(
                    "fake delete",
                    format!("delete of {target} rejected"),
                ));
            }
        }

        if !state.objects.contains_key(target) {
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        state.deleted.push(target.clone());

        match state.linger_on_delete.get(target).copied() {
            Some(reads) if !state.lingering.contains_key(target) => {
                state.lingering.insert(target.clone(), reads);
            }
            Some(_) => {}
            None => {
                state.objects.remove(target);
            }
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn merge_patch(&self, target: &ResourceRef, patch: Value) -> Result<Value> {
        let (patched, reactions) = {
            let mut guard = self.state();
            let state = &mut *guard;
            let Some(object) = state.objects.get_mut(target) else {
                return Err(Error::internal_with_context(
                    "fake patch",
                    format!("{target} not found"),
                ));
            };
            merge(object, &patch);
            let patched = object.clone();
            state.patches.push((target.clone(), patch));
            let reactions = state.on_patch.get(target).cloned().unwrap_or_default();
            (patched, reactions)
        };
        self.react(reactions);
        Ok(patched)
    }
}

#[async_trait]
impl ApplicationStatusProvider for FakeCluster {
    async fn observe(&self, name: &str, namespace: &str) -> Result<ApplicationStatus> {
        observe_application(self, name, namespace).await
    }
}

#[async_trait]
impl ManifestApplier for FakeCluster {
    async fn apply(&self, path: &Path) -> Result<()> {
        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reactions = {
            let mut state = self.state();
            state.applied.push(path.to_path_buf());
            state.on_apply.get(&key).cloned().unwrap_or_default()
        };
        self.react(reactions);
        Ok(())
    }

    async fn apply_in(&self, path: &Path, namespace: &str) -> Result<()> {
        self.state()
            .relocations
            .push((path.to_path_buf(), namespace.to_string()));
        self.apply(path).await
    }
}

/// JSON merge patch: objects merge recursively, `null` deletes, the rest replaces
fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in patch {
            if value.is_null() {
                map.remove(key);
            } else {
                merge(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{PollOutcome, ResourceKind};
    use serde_json::json;

    fn cm() -> ResourceRef {
        ResourceRef::new(ResourceKind::ConfigMap, "argocd-cm", "openshift-gitops")
    }

    #[tokio::test]
    async fn scripted_reads_run_before_the_stored_object() {
        let cluster = FakeCluster::new();
        cluster.insert(&cm(), json!({ "data": {} }));
        cluster.appear_after(&cm(), 1);
        cluster.fail_next(&cm(), 1, "boom");

        assert_eq!(cluster.fetch(&cm()).await, PollOutcome::NotFound);
        assert!(matches!(cluster.fetch(&cm()).await, PollOutcome::TransientError(_)));
        assert_eq!(cluster.fetch(&cm()).await, PollOutcome::Found);
        assert_eq!(cluster.reads(&cm()), 3);
    }

    #[tokio::test]
    async fn lingering_delete_stays_visible_for_the_configured_reads() {
        let cluster = FakeCluster::new();
        cluster.insert(&cm(), json!({}));
        cluster.linger_on_delete(&cm(), 2);

        assert_eq!(cluster.delete(&cm()).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(cluster.fetch(&cm()).await, PollOutcome::Found);
        assert_eq!(cluster.fetch(&cm()).await, PollOutcome::Found);
        assert_eq!(cluster.fetch(&cm()).await, PollOutcome::NotFound);
        assert_eq!(
            cluster.delete(&cm()).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn create_is_idempotent_and_fires_reactions_once() {
        let cluster = FakeCluster::new();
        let dependent = ResourceRef::new(ResourceKind::Deployment, "inst-server", "openshift-gitops");
        let d = dependent.clone();
        cluster.on_create(&cm(), move |c| c.insert(&d, json!({})));

        assert_eq!(cluster.create(&cm(), json!({})).await.unwrap(), CreateOutcome::Created);
        assert_eq!(
            cluster.create(&cm(), json!({})).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert!(cluster.contains(&dependent));
        assert_eq!(cluster.created(), vec![cm()]);
    }

    #[tokio::test]
    async fn merge_patch_merges_and_removes_nulls() {
        let cluster = FakeCluster::new();
        cluster.insert(&cm(), json!({ "spec": { "a": 1, "b": { "c": 2 } } }));

        let patched = cluster
            .merge_patch(&cm(), json!({ "spec": { "a": null, "b": { "d": 3 } } }))
            .await
            .unwrap();

        assert_eq!(patched, json!({ "spec": { "b": { "c": 2, "d": 3 } } }));
        assert_eq!(cluster.patches().len(), 1);
    }

    #[tokio::test]
    async fn patching_a_missing_object_fails() {
        let cluster = FakeCluster::new();
        assert!(cluster.merge_patch(&cm(), json!({})).await.is_err());
    }

    #[tokio::test]
    async fn failing_deletes_are_consumed() {
        let cluster = FakeCluster::new();
        cluster.insert(&cm(), json!({}));
        cluster.fail_deletes(&cm(), 1);

        assert!(cluster.delete(&cm()).await.is_err());
        assert_eq!(cluster.delete(&cm()).await.unwrap(), DeleteOutcome::Deleted);
    }
}
