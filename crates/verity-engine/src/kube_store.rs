//! Kubernetes-backed accessor and mutator
//!
//! Each [`ResourceKind`] is served by one [`KindHandle`] picked from a
//! [`KindRegistry`]: built-in kinds use typed `k8s-openapi` APIs, custom
//! kinds go through `DynamicObject`. The pollers never see which.

use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use verity_common::kube_utils::{build_api_resource, is_already_exists, is_not_found};
use verity_common::retry::{retry_if, RetryConfig};

use crate::accessor::{CreateOutcome, DeleteOutcome, ResourceAccessor, ResourceMutator};
use crate::resource::{ResourceKind, ResourceRef, Scope};
use crate::status::{observe_application, ApplicationStatus, ApplicationStatusProvider};
use crate::{Error, Result};

/// Per-kind access to the API server
#[async_trait]
pub trait KindHandle: Send + Sync {
    /// GET; `Ok(None)` on 404
    async fn get(&self, client: &Client, target: &ResourceRef) -> Result<Option<Value>>;
    /// POST `body`
    async fn create(&self, client: &Client, target: &ResourceRef, body: Value) -> Result<()>;
    /// DELETE with background propagation
    async fn delete(&self, client: &Client, target: &ResourceRef) -> Result<()>;
    /// PATCH with a JSON merge patch
    async fn merge_patch(&self, client: &Client, target: &ResourceRef, patch: &Value)
        -> Result<Value>;
}

/// Builds the `Api` a handle talks to for one target
pub trait ScopedApi: Send + Sync {
    /// Object type served by the API
    type Object: Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static;

    /// Api scoped to `target`'s namespace (or cluster-wide)
    fn api(&self, client: &Client, target: &ResourceRef) -> Api<Self::Object>;
}

fn to_value<K: Serialize>(object: &K, target: &ResourceRef) -> Result<Value> {
    serde_json::to_value(object)
        .map_err(|e| Error::serialization_for_kind(target.kind().kind(), e.to_string()))
}

/// `get_opt` already folds 404 into `None`; every other failure stays an error
fn read_result<K: Serialize>(
    target: &ResourceRef,
    fetched: kube::Result<Option<K>>,
) -> Result<Option<Value>> {
    match fetched? {
        Some(object) => to_value(&object, target).map(Some),
        None => Ok(None),
    }
}

/// 409 AlreadyExists on create is an outcome, not a failure
fn create_outcome(target: &ResourceRef, result: Result<()>) -> Result<CreateOutcome> {
    match result {
        Ok(()) => {
            debug!(resource = %target, "created");
            Ok(CreateOutcome::Created)
        }
        Err(Error::Kube { source }) if is_already_exists(&source) => {
            debug!(resource = %target, "already exists");
            Ok(CreateOutcome::AlreadyExists)
        }
        Err(e) => Err(e),
    }
}

/// 404 on delete means there was nothing to delete
fn delete_outcome(target: &ResourceRef, result: Result<()>) -> Result<DeleteOutcome> {
    match result {
        Ok(()) => {
            debug!(resource = %target, "deletion accepted");
            Ok(DeleteOutcome::Deleted)
        }
        Err(Error::Kube { source }) if is_not_found(&source) => {
            debug!(resource = %target, "already absent");
            Ok(DeleteOutcome::AlreadyAbsent)
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl<T: ScopedApi> KindHandle for T {
    async fn get(&self, client: &Client, target: &ResourceRef) -> Result<Option<Value>> {
        read_result(target, self.api(client, target).get_opt(target.name()).await)
    }

    async fn create(&self, client: &Client, target: &ResourceRef, body: Value) -> Result<()> {
        let object: T::Object = serde_json::from_value(body)
            .map_err(|e| Error::serialization_for_kind(target.kind().kind(), e.to_string()))?;
        self.api(client, target)
            .create(&PostParams::default(), &object)
            .await?;
        Ok(())
    }

    async fn delete(&self, client: &Client, target: &ResourceRef) -> Result<()> {
        self.api(client, target)
            .delete(target.name(), &DeleteParams::background())
            .await?;
        Ok(())
    }

    async fn merge_patch(
        &self,
        client: &Client,
        target: &ResourceRef,
        patch: &Value,
    ) -> Result<Value> {
        let patched = self
            .api(client, target)
            .patch(target.name(), &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        to_value(&patched, target)
    }
}

/// Typed handle for a namespaced `k8s-openapi` kind
pub struct NamespacedTyped<K>(PhantomData<fn() -> K>);

impl<K> Default for NamespacedTyped<K> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<K> ScopedApi for NamespacedTyped<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    type Object = K;

    fn api(&self, client: &Client, target: &ResourceRef) -> Api<K> {
        Api::namespaced(client.clone(), target.namespace())
    }
}

/// Typed handle for a cluster-scoped `k8s-openapi` kind
pub struct ClusterTyped<K>(PhantomData<fn() -> K>);

impl<K> Default for ClusterTyped<K> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<K> ScopedApi for ClusterTyped<K>
where
    K: Resource<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    type Object = K;

    fn api(&self, client: &Client, _target: &ResourceRef) -> Api<K> {
        Api::all(client.clone())
    }
}

/// Untyped handle for custom resources
#[derive(Debug, Clone)]
pub struct Dynamic {
    resource: ApiResource,
    scope: Scope,
}

impl Dynamic {
    /// Handle derived from a kind's apiVersion, kind and scope
    pub fn for_kind(kind: ResourceKind) -> Self {
        Self {
            resource: build_api_resource(kind.api_version(), kind.kind()),
            scope: kind.scope(),
        }
    }

    /// The resolved API resource
    pub fn api_resource(&self) -> &ApiResource {
        &self.resource
    }
}

impl ScopedApi for Dynamic {
    type Object = DynamicObject;

    fn api(&self, client: &Client, target: &ResourceRef) -> Api<DynamicObject> {
        match self.scope {
            Scope::Namespaced => {
                Api::namespaced_with(client.clone(), target.namespace(), &self.resource)
            }
            Scope::Cluster => Api::all_with(client.clone(), &self.resource),
        }
    }
}

/// Dispatch table from kind tag to handle
#[derive(Clone, Default)]
pub struct KindRegistry {
    handles: HashMap<ResourceKind, Arc<dyn KindHandle>>,
}

impl KindRegistry {
    /// Registry with no kinds
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every [`ResourceKind`]: typed for built-ins, dynamic for CRDs
    pub fn standard() -> Self {
        let mut registry = Self::empty()
            .register(ResourceKind::Namespace, ClusterTyped::<Namespace>::default())
            .register(ResourceKind::Deployment, NamespacedTyped::<Deployment>::default())
            .register(ResourceKind::Service, NamespacedTyped::<Service>::default())
            .register(ResourceKind::ConfigMap, NamespacedTyped::<ConfigMap>::default())
            .register(ResourceKind::ServiceAccount, NamespacedTyped::<ServiceAccount>::default())
            .register(ResourceKind::Role, NamespacedTyped::<Role>::default())
            .register(ResourceKind::RoleBinding, NamespacedTyped::<RoleBinding>::default());

        for kind in ResourceKind::ALL.into_iter().filter(|k| k.is_custom()) {
            registry = registry.register(kind, Dynamic::for_kind(kind));
        }
        registry
    }

    /// Add or replace the handle for `kind`
    pub fn register(mut self, kind: ResourceKind, handle: impl KindHandle + 'static) -> Self {
        self.handles.insert(kind, Arc::new(handle));
        self
    }

    /// Whether `kind` has a handle
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.handles.contains_key(&kind)
    }

    /// Handle for `kind`
    pub fn handle(&self, kind: ResourceKind) -> Result<&dyn KindHandle> {
        self.handles
            .get(&kind)
            .map(|h| h.as_ref())
            .ok_or_else(|| Error::config(format!("no handle registered for kind {kind}")))
    }
}

/// The live cluster, seen through the engine's seams
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    kinds: KindRegistry,
    retry: RetryConfig,
}

impl KubeCluster {
    /// Cluster with the standard kind registry
    pub fn new(client: Client) -> Self {
        Self::with_registry(client, KindRegistry::standard())
    }

    /// Cluster with a custom kind registry
    pub fn with_registry(client: Client, kinds: KindRegistry) -> Self {
        Self {
            client,
            kinds,
            retry: RetryConfig::default(),
        }
    }
}

#[async_trait]
impl ResourceAccessor for KubeCluster {
    async fn read(&self, target: &ResourceRef) -> Result<Option<Value>> {
        self.kinds
            .handle(target.kind())?
            .get(&self.client, target)
            .await
    }
}

#[async_trait]
impl ResourceMutator for KubeCluster {
    async fn create(&self, target: &ResourceRef, body: Value) -> Result<CreateOutcome> {
        let handle = self.kinds.handle(target.kind())?;
        let op = format!("create {target}");
        let result = retry_if(&self.retry, &op, Error::is_retryable, || {
            handle.create(&self.client, target, body.clone())
        })
        .await;
        create_outcome(target, result)
    }

    async fn delete(&self, target: &ResourceRef) -> Result<DeleteOutcome> {
        let handle = self.kinds.handle(target.kind())?;
        let op = format!("delete {target}");
        let result = retry_if(&self.retry, &op, Error::is_retryable, || {
            handle.delete(&self.client, target)
        })
        .await;
        delete_outcome(target, result)
    }

    async fn merge_patch(&self, target: &ResourceRef, patch: Value) -> Result<Value> {
        let handle = self.kinds.handle(target.kind())?;
        let op = format!("patch {target}");
        retry_if(&self.retry, &op, Error::is_retryable, || {
            handle.merge_patch(&self.client, target, &patch)
        })
        .await
    }
}

#[async_trait]
impl ApplicationStatusProvider for KubeCluster {
    async fn observe(&self, name: &str, namespace: &str) -> Result<ApplicationStatus> {
        observe_application(self, name, namespace).await
    }
}
