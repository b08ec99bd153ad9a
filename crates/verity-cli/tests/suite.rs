//! The full scenario catalogue against an in-memory cluster
//!
//! The fake cluster plays the operator: objects it would create are seeded up
//! front or appear through reactions to the suite's own creates and applies.
//! Time is paused, so default deadlines cost nothing.

use std::sync::Arc;

use serde_json::{json, Value};

use verity_cli::commands::run::execute;
use verity_cli::config::RunConfig;
use verity_cli::scenarios::fixtures::*;
use verity_cli::scenarios::standalone::expected_resources;
use verity_cli::scenarios::*;
use verity_cli::Error;
use verity_engine::fake::FakeCluster;
use verity_engine::{ResourceKind, ResourceRef, ScenarioState, Timeouts, VerifyContext};

fn context(cluster: &Arc<FakeCluster>) -> VerifyContext {
    VerifyContext::for_cluster(cluster.clone(), cluster.clone(), Timeouts::default())
}

fn ready() -> Value {
    json!({ "status": { "readyReplicas": 1 } })
}

fn healthy_and_synced() -> Value {
    json!({ "status": { "health": { "status": "Healthy" }, "sync": { "status": "Synced" } } })
}

fn default_instance() -> ResourceRef {
    ResourceRef::new(ResourceKind::ArgoCd, ARGOCD_INSTANCE_NAME, ARGOCD_NAMESPACE)
}

fn standalone_instance() -> ResourceRef {
    ResourceRef::new(ResourceKind::ArgoCd, STANDALONE_INSTANCE_NAME, STANDALONE_NAMESPACE)
}

/// A cluster where the operator did everything it should
fn operator_cluster() -> Arc<FakeCluster> {
    let c = Arc::new(FakeCluster::new());
    let ns = ARGOCD_NAMESPACE;

    c.insert(&ResourceRef::new(ResourceKind::Deployment, OPERATOR_NAME, OPERATOR_NAMESPACE), ready());

    c.insert(&ResourceRef::new(ResourceKind::Deployment, BACKEND_NAME, BACKEND_NAMESPACE), ready());
    c.insert(&ResourceRef::new(ResourceKind::Service, BACKEND_NAME, BACKEND_NAMESPACE), json!({}));
    c.insert(&ResourceRef::new(ResourceKind::Route, BACKEND_NAME, BACKEND_NAMESPACE), json!({}));

    let host = "openshift-gitops-server-openshift-gitops.apps.example.com";
    c.insert(
        &ResourceRef::new(ResourceKind::Route, ARGOCD_ROUTE_NAME, ns),
        json!({ "spec": { "host": host } }),
    );
    c.insert(
        &ResourceRef::cluster(ResourceKind::ConsoleLink, CONSOLE_LINK_NAME),
        json!({ "spec": { "href": format!("https://{host}") } }),
    );

    c.insert(&ResourceRef::namespace_object(ns), json!({}));
    c.insert(&default_instance(), json!({ "spec": {} }));

    c.insert(&ResourceRef::new(ResourceKind::Role, format!("{ns}-read"), ns), json!({}));
    c.insert(
        &ResourceRef::new(ResourceKind::RoleBinding, format!("{ns}-prometheus-k8s-read-binding"), ns),
        json!({}),
    );
    for monitor in [
        ARGOCD_INSTANCE_NAME.to_string(),
        format!("{ARGOCD_INSTANCE_NAME}-server"),
        format!("{ARGOCD_INSTANCE_NAME}-repo-server"),
    ] {
        c.insert(&ResourceRef::new(ResourceKind::ServiceMonitor, monitor, ns), json!({}));
    }
    c.insert(&ResourceRef::new(ResourceKind::PrometheusRule, ARGOCD_ALERTS_RULE, ns), json!({}));

    c.on_apply(IMAGE_APP_MANIFEST, |c| {
        c.insert(
            &ResourceRef::new(ResourceKind::Application, IMAGE_APP_NAME, ARGOCD_NAMESPACE),
            healthy_and_synced(),
        );
        c.insert(&ResourceRef::cluster(ResourceKind::Image, CLUSTER_IMAGE_NAME), json!({}));
    });
    c.on_apply(IDENTITY_PROVIDER_MANIFEST, |c| {
        c.insert(
            &ResourceRef::new(ResourceKind::Application, IDENTITY_PROVIDER_APP_NAME, NON_DEFAULT_NAMESPACE),
            healthy_and_synced(),
        );
    });
    c.on_create(&standalone_instance(), |c| {
        for r in expected_resources(STANDALONE_NAMESPACE, STANDALONE_INSTANCE_NAME).refs() {
            c.insert(&r, json!({}));
        }
    });
    c
}

// ==========================================================================
// Story: A healthy operator passes every scenario
// ==========================================================================

#[tokio::test(start_paused = true)]
async fn every_scenario_passes_on_a_healthy_operator() {
    let cluster = operator_cluster();

    let report = execute(&RunConfig::default(), context(&cluster)).await.unwrap();

    for r in &report.scenarios {
        assert!(r.passed(), "{} ended {}: {:?}", r.name, r.state, r.detail);
    }
    assert_eq!(report.scenarios.len(), SCENARIO_NAMES.len());
    assert!(report.into_result().is_ok());

    // The manual edit was made and the teardown actually removed the instance
    assert_eq!(cluster.patches().len(), 1);
    assert!(!cluster.contains(&default_instance()));
    assert!(cluster.contains(&ResourceRef::namespace_object(STANDALONE_NAMESPACE)));
}

#[tokio::test(start_paused = true)]
async fn namespaces_created_by_an_earlier_run_are_reused() {
    let cluster = operator_cluster();
    cluster.insert(&ResourceRef::namespace_object(NON_DEFAULT_NAMESPACE), json!({}));

    let config = RunConfig {
        only: vec![OPERATOR_DEPLOYMENT.to_string(), NON_DEFAULT_NAMESPACE_MANAGEMENT.to_string()],
        ..RunConfig::default()
    };
    let report = execute(&config, context(&cluster)).await.unwrap();

    assert!(report.passed());
    assert!(!cluster.created().contains(&ResourceRef::namespace_object(NON_DEFAULT_NAMESPACE)));
}

// ==========================================================================
// Story: Failures are named and dependents are skipped
// ==========================================================================

#[tokio::test(start_paused = true)]
async fn reverted_manual_edit_fails_installation_and_skips_teardown() {
    let cluster = operator_cluster();
    let instance = default_instance();
    let reverted = instance.clone();
    cluster.on_patch(&instance, move |c| {
        c.insert(&reverted, json!({ "spec": { "disableAdmin": false } }));
    });

    let report = execute(&RunConfig::default(), context(&cluster)).await.unwrap();

    let installation = report.get(ARGOCD_INSTALLATION).unwrap();
    assert_eq!(installation.state, ScenarioState::Failed);
    assert!(installation.detail.as_deref().unwrap().contains("spec.disableAdmin"));

    let teardown = report.get(ARGOCD_TEARDOWN).unwrap();
    assert_eq!(teardown.state, ScenarioState::Skipped);
    assert!(cluster.contains(&instance));

    // Unrelated scenarios still ran
    assert!(report.get(NAMESPACE_SCOPED_INSTALL).unwrap().passed());

    match report.into_result().unwrap_err() {
        Error::ScenariosFailed { failed, names, .. } => {
            assert_eq!(failed, 1);
            assert_eq!(names, ARGOCD_INSTALLATION);
        }
        other => panic!("expected ScenariosFailed, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn application_that_never_syncs_times_out() {
    let cluster = operator_cluster();
    cluster.on_apply(IMAGE_APP_MANIFEST, |c| {
        c.insert(
            &ResourceRef::new(ResourceKind::Application, IMAGE_APP_NAME, ARGOCD_NAMESPACE),
            json!({ "status": { "health": { "status": "Progressing" }, "sync": { "status": "OutOfSync" } } }),
        );
    });

    let config = RunConfig {
        only: vec![MACHINE_CONFIG_UPDATES.to_string()],
        ..RunConfig::default()
    };
    let report = execute(&config, context(&cluster)).await.unwrap();

    let r = report.get(MACHINE_CONFIG_UPDATES).unwrap();
    assert_eq!(r.state, ScenarioState::TimedOut);
    assert!(r.detail.as_deref().unwrap().contains("health=Progressing sync=OutOfSync"));
}

#[tokio::test(start_paused = true)]
async fn broken_console_link_is_a_mismatch() {
    let cluster = operator_cluster();
    cluster.insert(
        &ResourceRef::cluster(ResourceKind::ConsoleLink, CONSOLE_LINK_NAME),
        json!({ "spec": { "href": "https://somewhere-else.example.com" } }),
    );

    let config = RunConfig {
        only: vec![CONSOLE_LINK.to_string()],
        ..RunConfig::default()
    };
    let report = execute(&config, context(&cluster)).await.unwrap();

    let r = report.get(CONSOLE_LINK).unwrap();
    assert_eq!(r.state, ScenarioState::Failed);
    assert!(r.detail.as_deref().unwrap().contains("somewhere-else"));
}

// ==========================================================================
// Story: A namespace that will not go away stops the run
// ==========================================================================

#[tokio::test(start_paused = true)]
async fn stuck_standalone_namespace_skips_the_whole_run() {
    let cluster = operator_cluster();
    let ns = ResourceRef::namespace_object(STANDALONE_NAMESPACE);
    cluster.insert(&ns, json!({}));
    cluster.linger_on_delete(&ns, u32::MAX);

    let report = execute(&RunConfig::default(), context(&cluster)).await.unwrap();

    assert_eq!(report.count(ScenarioState::Skipped), SCENARIO_NAMES.len());
    assert!(report.aborted.as_deref().unwrap().contains(STANDALONE_NAMESPACE));
    assert!(cluster.patches().is_empty());
    assert!(cluster.contains(&default_instance()));

    let err = report.into_result().unwrap_err();
    assert!(err.to_string().contains("clean slate"));
}

#[tokio::test(start_paused = true)]
async fn leftover_namespace_is_removed_before_the_install() {
    let cluster = operator_cluster();
    let ns = ResourceRef::namespace_object(STANDALONE_NAMESPACE);
    cluster.insert(&ns, json!({ "metadata": { "labels": { "leftover": "true" } } }));
    cluster.linger_on_delete(&ns, 3);

    let report = execute(&RunConfig::default(), context(&cluster)).await.unwrap();

    assert!(report.passed());
    assert_eq!(cluster.deleted()[0], ns);
    // Recreated fresh by the install trigger
    assert_eq!(cluster.get(&ns).unwrap().pointer("/metadata/labels"), None);
}
