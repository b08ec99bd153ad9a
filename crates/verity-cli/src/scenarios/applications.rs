//! Applications synced by Argo CD instances the operator manages

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use verity_engine::accessor::object_body;
use verity_engine::status::StatusTarget;
use verity_engine::{CreateOutcome, ExpectationSet, ResourceKind, ResourceRef, Scenario, VerifyContext};

use super::fixtures::{CLUSTER_IMAGE_NAME, IDENTITY_PROVIDER_APP_NAME, IMAGE_APP_NAME, NON_DEFAULT_INSTANCE_NAME};
use super::{after_operator, MACHINE_CONFIG_UPDATES, NON_DEFAULT_NAMESPACE_MANAGEMENT};
use crate::Result;

/// Create `target`, treating an existing object as success
pub(crate) async fn ensure_created(ctx: &VerifyContext, target: &ResourceRef, spec: Value) -> Result<()> {
    let outcome = ctx.mutator().create(target, object_body(target, spec)).await?;
    match outcome {
        CreateOutcome::Created => info!(resource = %target, "created"),
        CreateOutcome::AlreadyExists => info!(resource = %target, "already exists, reusing"),
    }
    Ok(())
}

/// The `image` Application syncs and the cluster Image config exists
pub struct MachineConfigUpdates {
    manifest: PathBuf,
    namespace: String,
    status_deadline: Duration,
    deadline: Duration,
}

impl MachineConfigUpdates {
    /// Apply `manifest` and watch the `image` Application in `namespace`
    pub fn new(manifest: PathBuf, namespace: &str, status_deadline: Duration, deadline: Duration) -> Self {
        Self {
            manifest,
            namespace: namespace.to_string(),
            status_deadline,
            deadline,
        }
    }
}

#[async_trait]
impl Scenario for MachineConfigUpdates {
    fn name(&self) -> &str {
        MACHINE_CONFIG_UPDATES
    }

    fn requires(&self) -> Vec<String> {
        after_operator()
    }

    async fn trigger(&self, ctx: &VerifyContext) -> Result<()> {
        ctx.applier().apply(&self.manifest).await
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        ctx.require_status(
            &StatusTarget::healthy_and_synced(IMAGE_APP_NAME, &self.namespace),
            self.status_deadline,
        )
        .await?;

        // Cluster-scoped, so the set's namespace only labels diagnostics
        let image = ExpectationSet::new(&self.namespace).expect(ResourceKind::Image, [CLUSTER_IMAGE_NAME]);
        ctx.converge(&image, self.deadline).await?;
        Ok(())
    }
}

/// An instance outside the default namespace syncs `identity-provider`
pub struct NonDefaultNamespaceManagement {
    manifest: PathBuf,
    namespace: String,
    status_deadline: Duration,
}

impl NonDefaultNamespaceManagement {
    /// Stand up an instance in `namespace` and apply `manifest` to it
    pub fn new(manifest: PathBuf, namespace: &str, status_deadline: Duration) -> Self {
        Self {
            manifest,
            namespace: namespace.to_string(),
            status_deadline,
        }
    }
}

#[async_trait]
impl Scenario for NonDefaultNamespaceManagement {
    fn name(&self) -> &str {
        NON_DEFAULT_NAMESPACE_MANAGEMENT
    }

    fn requires(&self) -> Vec<String> {
        after_operator()
    }

    async fn trigger(&self, ctx: &VerifyContext) -> Result<()> {
        ensure_created(ctx, &ResourceRef::namespace_object(&self.namespace), Value::Null).await?;
        let instance = ResourceRef::new(ResourceKind::ArgoCd, NON_DEFAULT_INSTANCE_NAME, &self.namespace);
        ensure_created(ctx, &instance, json!({})).await?;
        ctx.applier().apply_in(&self.manifest, &self.namespace).await
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        ctx.require_status(
            &StatusTarget::healthy_and_synced(IDENTITY_PROVIDER_APP_NAME, &self.namespace),
            self.status_deadline,
        )
        .await
    }
}
