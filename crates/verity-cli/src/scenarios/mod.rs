//! GitOps operator scenario catalogue
//!
//! One scenario per side effect the operator owes the cluster. Order
//! matters: the operator must be running before anything it creates is
//! checked, and the default instance is torn down last.

use std::sync::Arc;

use verity_engine::Scenario;

use crate::config::RunConfig;
use crate::{Error, Result};

pub mod applications;
pub mod argocd;
pub mod fixtures;
pub mod operator;
pub mod standalone;

/// Operator Deployment becomes ready
pub const OPERATOR_DEPLOYMENT: &str = "operator-deployment";
/// Backend Deployment, Service and Route exist
pub const GITOPS_BACKEND: &str = "gitops-backend";
/// ConsoleLink points at the Argo CD route
pub const CONSOLE_LINK: &str = "console-link";
/// Default instance exists and manual edits survive
pub const ARGOCD_INSTALLATION: &str = "argocd-installation";
/// Monitoring objects for the default instance exist
pub const ARGOCD_METRICS: &str = "argocd-metrics";
/// `image` Application syncs the cluster Image config
pub const MACHINE_CONFIG_UPDATES: &str = "machine-config-updates";
/// Instance in a non-default namespace syncs an Application
pub const NON_DEFAULT_NAMESPACE_MANAGEMENT: &str = "non-default-namespace-management";
/// Namespace-scoped instance gets its full set of resources
pub const NAMESPACE_SCOPED_INSTALL: &str = "namespace-scoped-install";
/// Deleting the default instance takes effect
pub const ARGOCD_TEARDOWN: &str = "argocd-teardown";

/// Every scenario name, in execution order
pub const SCENARIO_NAMES: [&str; 9] = [
    OPERATOR_DEPLOYMENT,
    GITOPS_BACKEND,
    CONSOLE_LINK,
    ARGOCD_INSTALLATION,
    ARGOCD_METRICS,
    MACHINE_CONFIG_UPDATES,
    NON_DEFAULT_NAMESPACE_MANAGEMENT,
    NAMESPACE_SCOPED_INSTALL,
    ARGOCD_TEARDOWN,
];

/// Requirement shared by every scenario that inspects operator output
pub(crate) fn after_operator() -> Vec<String> {
    vec![OPERATOR_DEPLOYMENT.to_string()]
}

/// The full ordered catalogue for `config`
pub fn catalogue(config: &RunConfig) -> Vec<Arc<dyn Scenario>> {
    let f = &config.fixtures;
    let t = &config.timeouts;

    let mut scenarios: Vec<Arc<dyn Scenario>> = Vec::with_capacity(SCENARIO_NAMES.len());
    if !config.skip_operator_deployment {
        scenarios.push(Arc::new(operator::OperatorDeployment::new(&f.operator_namespace, t.timeout)));
    }
    scenarios.push(Arc::new(operator::GitopsBackend::new(&f.backend_namespace, t.timeout)));
    scenarios.push(Arc::new(operator::ConsoleLink::new(&f.argocd_namespace, t.timeout)));
    scenarios.push(Arc::new(argocd::Installation::new(&f.argocd_namespace, t.timeout)));
    scenarios.push(Arc::new(argocd::Metrics::new(&f.argocd_namespace, t.timeout)));
    scenarios.push(Arc::new(applications::MachineConfigUpdates::new(
        f.manifest(fixtures::IMAGE_APP_MANIFEST),
        &f.argocd_namespace,
        t.status_timeout,
        t.timeout,
    )));
    scenarios.push(Arc::new(applications::NonDefaultNamespaceManagement::new(
        f.manifest(fixtures::IDENTITY_PROVIDER_MANIFEST),
        &f.non_default_namespace,
        t.status_timeout,
    )));
    scenarios.push(Arc::new(standalone::NamespaceScopedInstall::new(
        &f.standalone_namespace,
        t.install_timeout,
    )));
    scenarios.push(Arc::new(argocd::Teardown::new(&f.argocd_namespace, t.timeout)));
    scenarios
}

/// Apply `--only` / `--skip`, keeping catalogue order
pub fn select(
    scenarios: Vec<Arc<dyn Scenario>>,
    only: &[String],
    skip: &[String],
) -> Result<Vec<Arc<dyn Scenario>>> {
    for name in only.iter().chain(skip) {
        if !SCENARIO_NAMES.contains(&name.as_str()) {
            return Err(Error::config(format!(
                "unknown scenario '{name}' (known: {})",
                SCENARIO_NAMES.join(", ")
            )));
        }
    }

    Ok(scenarios
        .into_iter()
        .filter(|s| only.is_empty() || only.iter().any(|n| n == s.name()))
        .filter(|s| !skip.iter().any(|n| n == s.name()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(scenarios: &[Arc<dyn Scenario>]) -> Vec<String> {
        scenarios.iter().map(|s| s.name().to_string()).collect()
    }

    #[test]
    fn catalogue_follows_the_declared_order() {
        let all = catalogue(&RunConfig::default());
        assert_eq!(names(&all), SCENARIO_NAMES);
    }

    #[test]
    fn skipping_operator_deployment_drops_only_that_scenario() {
        let config = RunConfig {
            skip_operator_deployment: true,
            ..RunConfig::default()
        };
        let all = catalogue(&config);
        assert_eq!(all.len(), SCENARIO_NAMES.len() - 1);
        assert_eq!(all[0].name(), GITOPS_BACKEND);
    }

    #[test]
    fn teardown_requires_the_installation() {
        let all = catalogue(&RunConfig::default());
        let teardown = all.iter().find(|s| s.name() == ARGOCD_TEARDOWN).unwrap();
        assert!(teardown.requires().contains(&ARGOCD_INSTALLATION.to_string()));
    }

    #[test]
    fn only_and_skip_filter_in_catalogue_order() {
        let only = vec![ARGOCD_TEARDOWN.to_string(), CONSOLE_LINK.to_string()];
        let picked = select(catalogue(&RunConfig::default()), &only, &[]).unwrap();
        assert_eq!(names(&picked), [CONSOLE_LINK, ARGOCD_TEARDOWN]);

        let skip = vec![ARGOCD_TEARDOWN.to_string()];
        let rest = select(catalogue(&RunConfig::default()), &[], &skip).unwrap();
        assert_eq!(rest.len(), SCENARIO_NAMES.len() - 1);
    }

    #[test]
    fn unknown_names_are_a_config_error() {
        let err = select(catalogue(&RunConfig::default()), &["rhsso".to_string()], &[])
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown scenario 'rhsso'"));
    }
}
