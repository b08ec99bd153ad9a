//! Manifest applier seam
//!
//! Scenarios trigger the reconciler by applying manifest files. How the file
//! reaches the cluster is injected: server-side apply through the kube client,
//! or an external `kubectl`/`oc` binary.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::{self, Scope};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use verity_common::kube_utils::{parse_api_version, ManifestIdentity};
use verity_common::{yaml, FIELD_MANAGER};

use crate::{Error, Result};

/// Applies a manifest file to the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    /// Apply every document in the file at `path`
    async fn apply(&self, path: &Path) -> Result<()>;

    /// Apply the file at `path` with its namespaced documents moved into
    /// `namespace`, whatever namespace the file itself names
    async fn apply_in(&self, path: &Path, namespace: &str) -> Result<()>;
}

/// Read and split a manifest file into its documents
pub async fn load_manifest(path: &Path) -> Result<Vec<Value>> {
    let manifest_path = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::manifest(&manifest_path, format!("failed to read: {e}")))?;
    let documents = yaml::parse_documents(&content)
        .map_err(|e| Error::manifest(&manifest_path, e.to_string()))?;
    if documents.is_empty() {
        return Err(Error::manifest(manifest_path, "no documents in file"));
    }
    Ok(documents)
}

/// Point a document that names a namespace at `namespace` instead
pub fn relocate(document: &mut Value, namespace: &str) {
    if let Some(current) = document.pointer_mut("/metadata/namespace") {
        *current = Value::String(namespace.to_string());
    }
}

/// Server-side apply through the kube client, resolving kinds by discovery
#[derive(Clone)]
pub struct KubeManifestApplier {
    client: Client,
}

impl KubeManifestApplier {
    /// Applier over `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn apply_document(&self, mut document: Value, namespace: Option<&str>) -> Result<()> {
        let mut id = ManifestIdentity::from_value(&document)?;
        let (group, version) = parse_api_version(&id.api_version);
        let gvk = GroupVersionKind::gvk(&group, &version, &id.kind);
        let (ar, caps) = discovery::pinned_kind(&self.client, &gvk).await?;

        if let (Scope::Namespaced, Some(ns)) = (&caps.scope, namespace) {
            document["metadata"]["namespace"] = Value::String(ns.to_string());
            id.namespace = Some(ns.to_string());
        }

        debug!(
            api_version = %id.api_version,
            kind = %id.kind,
            name = %id.name,
            namespace = ?id.namespace,
            "applying manifest document"
        );

        let object: DynamicObject = serde_json::from_value(document)
            .map_err(|e| Error::serialization_for_kind(&id.kind, e.to_string()))?;

        let api: Api<DynamicObject> = match (caps.scope, &id.namespace) {
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), &ar),
            (Scope::Namespaced, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &ar),
            (Scope::Namespaced, None) => Api::default_namespaced_with(self.client.clone(), &ar),
        };

        api.patch(
            &id.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&object),
        )
        .await?;

        info!(kind = %id.kind, name = %id.name, "applied manifest document");
        Ok(())
    }
}

#[async_trait]
impl ManifestApplier for KubeManifestApplier {
    async fn apply(&self, path: &Path) -> Result<()> {
        for document in load_manifest(path).await? {
            self.apply_document(document, None).await?;
        }
        Ok(())
    }

    async fn apply_in(&self, path: &Path, namespace: &str) -> Result<()> {
        for document in load_manifest(path).await? {
            self.apply_document(document, Some(namespace)).await?;
        }
        Ok(())
    }
}

/// Shells out to `<program> apply -f <path>`
#[derive(Debug, Clone)]
pub struct CommandApplier {
    program: PathBuf,
    kubeconfig: Option<PathBuf>,
}

impl CommandApplier {
    /// Applier invoking `program` (e.g. `kubectl` or `oc`)
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            kubeconfig: None,
        }
    }

    /// Pass `--kubeconfig` to every invocation
    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    fn args(&self, path: &Path) -> Vec<String> {
        let mut args = vec![
            "apply".to_string(),
            "-f".to_string(),
            path.display().to_string(),
        ];
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args
    }

    /// `apply -f - -n <namespace>`, documents arriving on stdin
    fn args_in(&self, namespace: &str) -> Vec<String> {
        let mut args = self.args(Path::new("-"));
        args.push("-n".to_string());
        args.push(namespace.to_string());
        args
    }

    fn check(&self, manifest_path: &str, output: Output) -> Result<()> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::manifest(
                manifest_path,
                format!("{} apply exited with {}: {}", self.program.display(), output.status, stderr.trim()),
            ));
        }

        info!(
            program = %self.program.display(),
            manifest = %manifest_path,
            "applied manifest"
        );
        Ok(())
    }

    fn spawn_error(&self, manifest_path: &str, e: std::io::Error) -> Error {
        Error::manifest(
            manifest_path,
            format!("failed to run {}: {e}", self.program.display()),
        )
    }
}

#[async_trait]
impl ManifestApplier for CommandApplier {
    async fn apply(&self, path: &Path) -> Result<()> {
        let manifest_path = path.display().to_string();
        let output = tokio::process::Command::new(&self.program)
            .args(self.args(path))
            .output()
            .await
            .map_err(|e| self.spawn_error(&manifest_path, e))?;
        self.check(&manifest_path, output)
    }

    async fn apply_in(&self, path: &Path, namespace: &str) -> Result<()> {
        let manifest_path = path.display().to_string();
        let mut items = load_manifest(path).await?;
        for document in &mut items {
            relocate(document, namespace);
        }
        let list = json!({ "apiVersion": "v1", "kind": "List", "items": items });

        let mut child = tokio::process::Command::new(&self.program)
            .args(self.args_in(namespace))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&manifest_path, e))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading stdin is judged by its status
            if let Err(e) = stdin.write_all(list.to_string().as_bytes()).await {
                debug!(manifest = %manifest_path, error = %e, "stdin closed early");
            }
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.spawn_error(&manifest_path, e))?;
        self.check(&manifest_path, output)
    }
}
