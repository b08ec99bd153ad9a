//! Names the GitOps operator creates or the suite relies on

/// Namespace the operator Deployment runs in
pub const OPERATOR_NAMESPACE: &str = "openshift-operators";
/// Operator Deployment name
pub const OPERATOR_NAME: &str = "gitops-operator";

/// Default Argo CD namespace; the instance inside it has the same name
pub const ARGOCD_NAMESPACE: &str = "openshift-gitops";
/// Default Argo CD instance name
pub const ARGOCD_INSTANCE_NAME: &str = "openshift-gitops";
/// Route exposing the default Argo CD server
pub const ARGOCD_ROUTE_NAME: &str = "openshift-gitops-server";
/// Cluster ConsoleLink pointing at the Argo CD route
pub const CONSOLE_LINK_NAME: &str = "argocd";
/// PrometheusRule carrying the operator's Argo CD alerts
pub const ARGOCD_ALERTS_RULE: &str = "gitops-operator-argocd-alerts";

/// Namespace of the GitOps backend service
pub const BACKEND_NAMESPACE: &str = "openshift-gitops";
/// Name shared by the backend Deployment, Service and Route
pub const BACKEND_NAME: &str = "cluster";

/// Namespace created for the namespace-scoped install
pub const STANDALONE_NAMESPACE: &str = "gitops-standalone-test";
/// Instance created in the standalone namespace
pub const STANDALONE_INSTANCE_NAME: &str = "standalone-argocd-instance";

/// Source namespace for the non-default Argo CD instance
pub const NON_DEFAULT_NAMESPACE: &str = "argocd-non-default-source";
/// Instance created in the non-default namespace
pub const NON_DEFAULT_INSTANCE_NAME: &str = "argocd-non-default-namespace-instance";

/// Manifest defining the `image` Application
pub const IMAGE_APP_MANIFEST: &str = "image_appcr.yaml";
/// Application synced from [`IMAGE_APP_MANIFEST`]
pub const IMAGE_APP_NAME: &str = "image";
/// Cluster Image config the `image` Application manages
pub const CLUSTER_IMAGE_NAME: &str = "cluster";

/// Manifest defining the `identity-provider` Application
pub const IDENTITY_PROVIDER_MANIFEST: &str = "identity-provider_appcr.yaml";
/// Application synced from [`IDENTITY_PROVIDER_MANIFEST`]
pub const IDENTITY_PROVIDER_APP_NAME: &str = "identity-provider";

/// Config maps every Argo CD instance owns
pub const ARGOCD_CONFIG_MAPS: [&str; 5] = [
    "argocd-cm",
    "argocd-gpg-keys-cm",
    "argocd-rbac-cm",
    "argocd-ssh-known-hosts-cm",
    "argocd-tls-certs-cm",
];
