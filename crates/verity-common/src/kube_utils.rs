//! Shared Kubernetes utilities using kube-rs
//!
//! Client construction with bounded timeouts, status-code classification,
//! and the apiVersion/kind plumbing needed to address CRDs dynamically.

use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
///
/// Poll rounds bound each fetch separately, so this only matters for
/// mutations and discovery.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP status the API server uses for "no such object"
pub const STATUS_NOT_FOUND: u16 = 404;
/// HTTP status the API server uses for "object already exists"
pub const STATUS_CONFLICT: u16 = 409;
/// HTTP status the API server uses when throttling a client
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// True when the API server reported that the object does not exist
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == STATUS_NOT_FOUND)
}

/// True when a create was rejected because the object already exists
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(
        err,
        kube::Error::Api(ae) if ae.code == STATUS_CONFLICT && ae.reason == "AlreadyExists"
    )
}

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from optional kubeconfig path with custom timeouts
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::config(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::config(format!("failed to load kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::config(format!("failed to infer kube config: {}", e)))?,
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);

    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use verity_common::kube_utils::parse_api_version;
///
/// let (group, version) = parse_api_version("argoproj.io/v1alpha1");
/// assert_eq!(group, "argoproj.io");
/// assert_eq!(version, "v1alpha1");
///
/// let (group, version) = parse_api_version("v1");
/// assert_eq!(group, "");
/// assert_eq!(version, "v1");
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from a known apiVersion and kind.
///
/// The version is used exactly as given. Manifests go through discovery
/// instead (see the engine's manifest applier).
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Kinds whose plural is not derivable by the simple rules below
const KIND_PLURALS: &[(&str, &str)] = &[
    ("argocd", "argocds"),
    ("consolelink", "consolelinks"),
    ("prometheusrule", "prometheusrules"),
    ("servicemonitor", "servicemonitors"),
    ("image", "images"),
];

/// Pluralize a Kubernetes resource kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Identity of a manifest document, extracted before applying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestIdentity {
    /// apiVersion as written in the manifest
    pub api_version: String,
    /// Kind as written in the manifest
    pub kind: String,
    /// metadata.name
    pub name: String,
    /// metadata.namespace, if the document sets one
    pub namespace: Option<String>,
}

impl ManifestIdentity {
    /// Extract apiVersion/kind/name/namespace from a parsed manifest
    pub fn from_value(value: &serde_json::Value) -> Result<Self, Error> {
        let field = |pointer: &str| value.pointer(pointer).and_then(|v| v.as_str());

        let api_version = field("/apiVersion")
            .ok_or_else(|| Error::serialization("manifest missing apiVersion"))?;
        let kind = field("/kind").ok_or_else(|| Error::serialization("manifest missing kind"))?;
        let name = field("/metadata/name")
            .ok_or_else(|| Error::serialization_for_kind(kind, "manifest missing metadata.name"))?;

        Ok(Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: field("/metadata/namespace").map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: String::new(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_not_found_classification() {
        assert!(is_not_found(&api_error(404, "NotFound")));
        assert!(!is_not_found(&api_error(500, "InternalError")));
        assert!(!is_not_found(&api_error(409, "AlreadyExists")));
    }

    #[test]
    fn test_already_exists_classification() {
        assert!(is_already_exists(&api_error(409, "AlreadyExists")));
        // Optimistic-concurrency conflicts are also 409 but are not "exists"
        assert!(!is_already_exists(&api_error(409, "Conflict")));
        assert!(!is_already_exists(&api_error(404, "NotFound")));
    }

    #[test]
    fn test_pluralize_kind() {
        assert_eq!(pluralize_kind("Deployment"), "deployments");
        assert_eq!(pluralize_kind("ConfigMap"), "configmaps");
        assert_eq!(pluralize_kind("Policy"), "policies");
        assert_eq!(pluralize_kind("Ingress"), "ingresses");
        assert_eq!(pluralize_kind("ArgoCD"), "argocds");
        assert_eq!(pluralize_kind("ServiceMonitor"), "servicemonitors");
        assert_eq!(pluralize_kind("Application"), "applications");
        assert_eq!(pluralize_kind("Route"), "routes");
    }

    #[test]
    fn test_build_api_resource_for_crd() {
        let ar = build_api_resource("argoproj.io/v1alpha1", "ArgoCD");
        assert_eq!(ar.group, "argoproj.io");
        assert_eq!(ar.version, "v1alpha1");
        assert_eq!(ar.plural, "argocds");
        assert_eq!(ar.api_version, "argoproj.io/v1alpha1");
    }

    #[test]
    fn test_build_api_resource_for_core_group() {
        let ar = build_api_resource("v1", "ConfigMap");
        assert_eq!(ar.group, "");
        assert_eq!(ar.version, "v1");
        assert_eq!(ar.plural, "configmaps");
    }

    #[test]
    fn test_manifest_identity_extraction() {
        let value = serde_json::json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": { "name": "identity-provider", "namespace": "argocd-non-default-source" }
        });
        let id = ManifestIdentity::from_value(&value).unwrap();
        assert_eq!(id.kind, "Application");
        assert_eq!(id.name, "identity-provider");
        assert_eq!(id.namespace.as_deref(), Some("argocd-non-default-source"));
    }

    #[test]
    fn test_manifest_identity_requires_name() {
        let value = serde_json::json!({ "apiVersion": "v1", "kind": "Namespace", "metadata": {} });
        let err = ManifestIdentity::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("metadata.name"));
    }
}
