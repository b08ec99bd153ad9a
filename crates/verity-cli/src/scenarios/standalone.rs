//! Namespace-scoped Argo CD install in a namespace the suite owns

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use verity_engine::{ExpectationSet, ResourceKind, ResourceRef, Scenario, VerifyContext};

use super::applications::ensure_created;
use super::fixtures::{ARGOCD_CONFIG_MAPS, STANDALONE_INSTANCE_NAME};
use super::{after_operator, NAMESPACE_SCOPED_INSTALL};
use crate::Result;

/// Everything the operator creates for an instance named `instance` in `namespace`
pub fn expected_resources(namespace: &str, instance: &str) -> ExpectationSet {
    let per_component = |suffixes: &[&str]| -> Vec<String> {
        suffixes.iter().map(|s| format!("{instance}-{s}")).collect()
    };

    ExpectationSet::new(namespace)
        .expect(
            ResourceKind::Deployment,
            per_component(&["dex-server", "redis", "repo-server", "server"]),
        )
        .expect(ResourceKind::ConfigMap, ARGOCD_CONFIG_MAPS)
        .expect(
            ResourceKind::ServiceAccount,
            per_component(&["argocd-application-controller", "argocd-server"]),
        )
        .expect(
            ResourceKind::Role,
            per_component(&["argocd-application-controller", "argocd-server"]),
        )
        .expect(
            ResourceKind::RoleBinding,
            per_component(&["argocd-application-controller", "argocd-server"]),
        )
        .expect(
            ResourceKind::ServiceMonitor,
            [instance.to_string()]
                .into_iter()
                .chain(per_component(&["repo-server", "server"])),
        )
}

/// A fresh instance in a clean namespace gets its full resource set
pub struct NamespaceScopedInstall {
    namespace: String,
    deadline: Duration,
}

impl NamespaceScopedInstall {
    /// Install into `namespace`, which is reset before the run
    pub fn new(namespace: &str, deadline: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            deadline,
        }
    }
}

#[async_trait]
impl Scenario for NamespaceScopedInstall {
    fn name(&self) -> &str {
        NAMESPACE_SCOPED_INSTALL
    }

    fn requires(&self) -> Vec<String> {
        after_operator()
    }

    fn clean_slate(&self) -> Vec<String> {
        vec![self.namespace.clone()]
    }

    async fn trigger(&self, ctx: &VerifyContext) -> Result<()> {
        ensure_created(ctx, &ResourceRef::namespace_object(&self.namespace), Value::Null).await?;
        let instance = ResourceRef::new(ResourceKind::ArgoCd, STANDALONE_INSTANCE_NAME, &self.namespace);
        ensure_created(ctx, &instance, json!({})).await
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        let expected = expected_resources(&self.namespace, STANDALONE_INSTANCE_NAME);
        ctx.converge(&expected, self.deadline).await?;
        Ok(())
    }
}
