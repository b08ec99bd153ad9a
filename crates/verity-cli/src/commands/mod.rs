//! CLI commands

use std::path::Path;
use std::sync::Arc;

use verity_common::kube_utils::create_client;
use verity_engine::kube_store::KubeCluster;
use verity_engine::manifest::{CommandApplier, KubeManifestApplier, ManifestApplier};
use verity_engine::{Timeouts, VerifyContext};

use crate::config::ApplyWith;
use crate::Result;

pub mod list;
pub mod reset;
pub mod run;

/// Context backed by the cluster `kubeconfig` points at
pub(crate) async fn cluster_context(
    kubeconfig: Option<&Path>,
    apply_with: ApplyWith,
    timeouts: Timeouts,
) -> Result<VerifyContext> {
    let client = create_client(kubeconfig).await?;
    let applier = manifest_applier(apply_with, kubeconfig, || KubeManifestApplier::new(client.clone()));
    let cluster = Arc::new(KubeCluster::new(client));
    Ok(VerifyContext::for_cluster(cluster, applier, timeouts))
}

/// The applier for `apply_with`; `kube` builds the in-process one lazily
pub(crate) fn manifest_applier<F>(
    apply_with: ApplyWith,
    kubeconfig: Option<&Path>,
    in_process: F,
) -> Arc<dyn ManifestApplier>
where
    F: FnOnce() -> KubeManifestApplier,
{
    let program = match apply_with {
        ApplyWith::Kube => return Arc::new(in_process()),
        ApplyWith::Kubectl => "kubectl",
        ApplyWith::Oc => "oc",
    };
    let applier = CommandApplier::new(program);
    match kubeconfig {
        Some(path) => Arc::new(applier.with_kubeconfig(path)),
        None => Arc::new(applier),
    }
}
