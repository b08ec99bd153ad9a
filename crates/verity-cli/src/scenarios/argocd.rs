//! The default Argo CD instance: install, monitoring, teardown

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use verity_engine::{ExpectationSet, ResourceKind, ResourceRef, Scenario, VerifyContext};

use super::fixtures::{ARGOCD_ALERTS_RULE, ARGOCD_INSTANCE_NAME};
use super::{after_operator, ARGOCD_INSTALLATION, ARGOCD_METRICS, ARGOCD_TEARDOWN};
use crate::{Error, Result};

fn instance_ref(namespace: &str) -> ResourceRef {
    ResourceRef::new(ResourceKind::ArgoCd, ARGOCD_INSTANCE_NAME, namespace)
}

/// Namespace and instance exist, and a manual `disableAdmin` edit sticks
pub struct Installation {
    namespace: String,
    deadline: Duration,
}

impl Installation {
    /// Check the default instance in `namespace`
    pub fn new(namespace: &str, deadline: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            deadline,
        }
    }
}

#[async_trait]
impl Scenario for Installation {
    fn name(&self) -> &str {
        ARGOCD_INSTALLATION
    }

    fn requires(&self) -> Vec<String> {
        after_operator()
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        let installed = ExpectationSet::new(&self.namespace)
            .expect(ResourceKind::Namespace, [self.namespace.as_str()])
            .expect(ResourceKind::ArgoCd, [ARGOCD_INSTANCE_NAME]);
        ctx.converge(&installed, self.deadline).await?;

        let instance = instance_ref(&self.namespace);
        ctx.mutator()
            .merge_patch(&instance, json!({ "spec": { "disableAdmin": true } }))
            .await?;
        info!(resource = %instance, "set spec.disableAdmin manually");

        ctx.observation_window().await;

        let current = ctx.read_existing(&instance).await?;
        let observed = current.pointer("/spec/disableAdmin").cloned().unwrap_or(Value::Null);
        if observed != Value::Bool(true) {
            return Err(Error::assertion_mismatch(
                instance.to_string(),
                "spec.disableAdmin",
                true,
                observed,
            ));
        }
        Ok(())
    }
}

/// Monitoring objects the operator creates for the default instance
pub struct Metrics {
    namespace: String,
    deadline: Duration,
}

impl Metrics {
    /// Check monitoring objects in `namespace`
    pub fn new(namespace: &str, deadline: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            deadline,
        }
    }

    /// Role, binding, monitors and alert rule for the default instance
    pub fn expectations(&self) -> ExpectationSet {
        let ns = &self.namespace;
        ExpectationSet::new(ns)
            .expect(ResourceKind::Role, [format!("{ns}-read")])
            .expect(
                ResourceKind::RoleBinding,
                [format!("{ns}-prometheus-k8s-read-binding")],
            )
            .expect(
                ResourceKind::ServiceMonitor,
                [
                    ARGOCD_INSTANCE_NAME.to_string(),
                    format!("{ARGOCD_INSTANCE_NAME}-server"),
                    format!("{ARGOCD_INSTANCE_NAME}-repo-server"),
                ],
            )
            .expect(ResourceKind::PrometheusRule, [ARGOCD_ALERTS_RULE])
    }
}

#[async_trait]
impl Scenario for Metrics {
    fn name(&self) -> &str {
        ARGOCD_METRICS
    }

    fn requires(&self) -> Vec<String> {
        after_operator()
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        ctx.converge(&self.expectations(), self.deadline).await?;
        Ok(())
    }
}

/// Deleting the default instance takes effect
pub struct Teardown {
    namespace: String,
    deadline: Duration,
}

impl Teardown {
    /// Delete the default instance in `namespace`
    pub fn new(namespace: &str, deadline: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            deadline,
        }
    }
}

#[async_trait]
impl Scenario for Teardown {
    fn name(&self) -> &str {
        ARGOCD_TEARDOWN
    }

    fn requires(&self) -> Vec<String> {
        vec![ARGOCD_INSTALLATION.to_string()]
    }

    async fn trigger(&self, ctx: &VerifyContext) -> Result<()> {
        let instance = instance_ref(&self.namespace);
        ctx.read_existing(&instance).await?;
        let outcome = ctx.mutator().delete(&instance).await?;
        info!(resource = %instance, ?outcome, "requested instance deletion");
        Ok(())
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        ctx.require_gone(&instance_ref(&self.namespace), self.deadline).await
    }
}
