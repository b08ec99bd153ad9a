//! The operator itself and the cluster-level objects it owns

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use verity_engine::status::deployment_ready;
use verity_engine::{ExpectationSet, ResourceKind, ResourceRef, Scenario, VerifyContext};

use super::fixtures::{
    ARGOCD_ROUTE_NAME, BACKEND_NAME, CONSOLE_LINK_NAME, OPERATOR_NAME,
};
use super::{after_operator, CONSOLE_LINK, GITOPS_BACKEND, OPERATOR_DEPLOYMENT};
use crate::{Error, Result};

/// The operator Deployment reports a ready replica
pub struct OperatorDeployment {
    namespace: String,
    deadline: Duration,
}

impl OperatorDeployment {
    /// Check `gitops-operator` in `namespace`
    pub fn new(namespace: &str, deadline: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            deadline,
        }
    }
}

#[async_trait]
impl Scenario for OperatorDeployment {
    fn name(&self) -> &str {
        OPERATOR_DEPLOYMENT
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        let deployment = ResourceRef::new(ResourceKind::Deployment, OPERATOR_NAME, &self.namespace);
        ctx.require_object(&deployment, "ready", deployment_ready(1), self.deadline)
            .await?;
        Ok(())
    }
}

/// Backend Deployment is ready and its Service and Route exist
pub struct GitopsBackend {
    namespace: String,
    deadline: Duration,
}

impl GitopsBackend {
    /// Check the `cluster` backend in `namespace`
    pub fn new(namespace: &str, deadline: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            deadline,
        }
    }
}

#[async_trait]
impl Scenario for GitopsBackend {
    fn name(&self) -> &str {
        GITOPS_BACKEND
    }

    fn requires(&self) -> Vec<String> {
        after_operator()
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        let deployment = ResourceRef::new(ResourceKind::Deployment, BACKEND_NAME, &self.namespace);
        ctx.require_object(&deployment, "ready", deployment_ready(1), self.deadline)
            .await?;

        let exposed = ExpectationSet::new(&self.namespace)
            .expect(ResourceKind::Service, [BACKEND_NAME])
            .expect(ResourceKind::Route, [BACKEND_NAME]);
        ctx.converge(&exposed, self.deadline).await?;
        Ok(())
    }
}

/// The ConsoleLink's href points at the Argo CD server route
pub struct ConsoleLink {
    argocd_namespace: String,
    deadline: Duration,
}

impl ConsoleLink {
    /// Compare the `argocd` ConsoleLink with the route in `argocd_namespace`
    pub fn new(argocd_namespace: &str, deadline: Duration) -> Self {
        Self {
            argocd_namespace: argocd_namespace.to_string(),
            deadline,
        }
    }
}

/// Host part of a console link href
pub fn link_host(href: &str) -> &str {
    href.strip_prefix("https://").unwrap_or(href)
}

fn string_field<'a>(object: &'a Value, pointer: &str) -> &'a str {
    object.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

#[async_trait]
impl Scenario for ConsoleLink {
    fn name(&self) -> &str {
        CONSOLE_LINK
    }

    fn requires(&self) -> Vec<String> {
        after_operator()
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
        let route = ResourceRef::new(ResourceKind::Route, ARGOCD_ROUTE_NAME, &self.argocd_namespace);
        let link = ResourceRef::cluster(ResourceKind::ConsoleLink, CONSOLE_LINK_NAME);

        let both = ExpectationSet::new(&self.argocd_namespace)
            .expect(ResourceKind::Route, [ARGOCD_ROUTE_NAME])
            .expect(ResourceKind::ConsoleLink, [CONSOLE_LINK_NAME]);
        ctx.converge(&both, self.deadline).await?;

        let route_object = ctx.read_existing(&route).await?;
        let link_object = ctx.read_existing(&link).await?;
        check_link_matches_route(&route, &route_object, &link, &link_object)
    }
}

/// The link's href must name the route's host; neither may be blank
pub fn check_link_matches_route(
    route: &ResourceRef,
    route_object: &Value,
    link: &ResourceRef,
    link_object: &Value,
) -> Result<()> {
    let host = string_field(route_object, "/spec/host");
    let href = string_field(link_object, "/spec/href");
    info!(host, href, "comparing console link with route");

    if host.is_empty() {
        return Err(Error::assertion_mismatch(route.to_string(), "spec.host", "a hostname", "<empty>"));
    }
    if href.is_empty() || link_host(href) != host {
        let got = if href.is_empty() { "<empty>" } else { href };
        return Err(Error::assertion_mismatch(
            link.to_string(),
            "spec.href",
            format!("https://{host}"),
            got,
        ));
    }
    Ok(())
}
