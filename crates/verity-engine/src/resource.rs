//! Resource identity and poll outcome types
//!
//! Everything here is value-like and owned by the scenario that builds it.
//! None of these types cache backing-store state.

use std::fmt;

/// Whether a kind lives inside a namespace or at cluster scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Addressed by namespace + name
    Namespaced,
    /// Addressed by name only
    Cluster,
}

/// Tag identifying a schema/category of resource.
///
/// Carries no fetch behavior; the kube backend selects a handle per kind from
/// its dispatch table (see `kube_store::KindRegistry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// core/v1 Namespace
    Namespace,
    /// apps/v1 Deployment
    Deployment,
    /// core/v1 Service
    Service,
    /// core/v1 ConfigMap
    ConfigMap,
    /// core/v1 ServiceAccount
    ServiceAccount,
    /// rbac.authorization.k8s.io/v1 Role
    Role,
    /// rbac.authorization.k8s.io/v1 RoleBinding
    RoleBinding,
    /// route.openshift.io/v1 Route
    Route,
    /// console.openshift.io/v1 ConsoleLink
    ConsoleLink,
    /// monitoring.coreos.com/v1 ServiceMonitor
    ServiceMonitor,
    /// monitoring.coreos.com/v1 PrometheusRule
    PrometheusRule,
    /// argoproj.io/v1alpha1 ArgoCD
    ArgoCd,
    /// argoproj.io/v1alpha1 Application
    Application,
    /// config.openshift.io/v1 Image
    Image,
}

impl ResourceKind {
    /// Every kind the engine knows how to address
    pub const ALL: [ResourceKind; 14] = [
        ResourceKind::Namespace,
        ResourceKind::Deployment,
        ResourceKind::Service,
        ResourceKind::ConfigMap,
        ResourceKind::ServiceAccount,
        ResourceKind::Role,
        ResourceKind::RoleBinding,
        ResourceKind::Route,
        ResourceKind::ConsoleLink,
        ResourceKind::ServiceMonitor,
        ResourceKind::PrometheusRule,
        ResourceKind::ArgoCd,
        ResourceKind::Application,
        ResourceKind::Image,
    ];

    /// Full apiVersion (e.g. "apps/v1", "argoproj.io/v1alpha1")
    pub fn api_version(self) -> &'static str {
        match self {
            ResourceKind::Namespace
            | ResourceKind::Service
            | ResourceKind::ConfigMap
            | ResourceKind::ServiceAccount => "v1",
            ResourceKind::Deployment => "apps/v1",
            ResourceKind::Role | ResourceKind::RoleBinding => "rbac.authorization.k8s.io/v1",
            ResourceKind::Route => "route.openshift.io/v1",
            ResourceKind::ConsoleLink => "console.openshift.io/v1",
            ResourceKind::ServiceMonitor | ResourceKind::PrometheusRule => {
                "monitoring.coreos.com/v1"
            }
            ResourceKind::ArgoCd | ResourceKind::Application => "argoproj.io/v1alpha1",
            ResourceKind::Image => "config.openshift.io/v1",
        }
    }

    /// Kind as the API server spells it
    pub fn kind(self) -> &'static str {
        match self {
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::Route => "Route",
            ResourceKind::ConsoleLink => "ConsoleLink",
            ResourceKind::ServiceMonitor => "ServiceMonitor",
            ResourceKind::PrometheusRule => "PrometheusRule",
            ResourceKind::ArgoCd => "ArgoCD",
            ResourceKind::Application => "Application",
            ResourceKind::Image => "Image",
        }
    }

    /// Namespaced or cluster scoped
    pub fn scope(self) -> Scope {
        match self {
            ResourceKind::Namespace | ResourceKind::ConsoleLink | ResourceKind::Image => {
                Scope::Cluster
            }
            _ => Scope::Namespaced,
        }
    }

    /// True for kinds served by a CRD rather than the core API
    pub fn is_custom(self) -> bool {
        matches!(
            self,
            ResourceKind::Route
                | ResourceKind::ConsoleLink
                | ResourceKind::ServiceMonitor
                | ResourceKind::PrometheusRule
                | ResourceKind::ArgoCd
                | ResourceKind::Application
                | ResourceKind::Image
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Identifies a single fetch target.
///
/// Fields are private so a ref can't change after construction. For
/// cluster-scoped kinds the namespace is always empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    kind: ResourceKind,
    name: String,
    namespace: String,
}

impl ResourceRef {
    /// Build a ref; the namespace is dropped for cluster-scoped kinds
    pub fn new(kind: ResourceKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let namespace = match kind.scope() {
            Scope::Namespaced => namespace.into(),
            Scope::Cluster => String::new(),
        };
        Self {
            kind,
            name: name.into(),
            namespace,
        }
    }

    /// Build a ref to a cluster-scoped object
    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::new(kind, name, String::new())
    }

    /// Ref to a Namespace object
    pub fn namespace_object(name: impl Into<String>) -> Self {
        Self::cluster(ResourceKind::Namespace, name)
    }

    /// The kind tag
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace (empty for cluster-scoped kinds)
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespace as an option, `None` for cluster-scoped kinds
    pub fn namespace_opt(&self) -> Option<&str> {
        (!self.namespace.is_empty()).then_some(self.namespace.as_str())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace_opt() {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// One kind and the names expected to exist for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    /// Kind of every name below
    pub kind: ResourceKind,
    /// Unique names, in declaration order
    pub names: Vec<String>,
}

/// Ordered set of (kind, names) pairs scoped to one namespace.
///
/// Satisfied only when every name of every kind resolves to `Found`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationSet {
    namespace: String,
    entries: Vec<Expectation>,
}

impl ExpectationSet {
    /// Empty set for a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Vec::new(),
        }
    }

    /// Add names for a kind.
    ///
    /// Duplicates are dropped and a kind that was already declared keeps its
    /// position, so names within a kind stay unique.
    pub fn expect<I, S>(mut self, kind: ResourceKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idx = match self.entries.iter().position(|e| e.kind == kind) {
            Some(idx) => idx,
            None => {
                self.entries.push(Expectation {
                    kind,
                    names: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        for name in names {
            let name = name.into();
            if !entry.names.contains(&name) {
                entry.names.push(name);
            }
        }
        self
    }

    /// Namespace every ref is resolved in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Declared entries in order
    pub fn entries(&self) -> &[Expectation] {
        &self.entries
    }

    /// Every ref derived from the set, in declaration order
    pub fn refs(&self) -> Vec<ResourceRef> {
        self.entries
            .iter()
            .flat_map(|e| {
                e.names
                    .iter()
                    .map(move |n| ResourceRef::new(e.kind, n.clone(), self.namespace.clone()))
            })
            .collect()
    }

    /// Total number of expected resources
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.names.len()).sum()
    }

    /// True when nothing is expected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one fetch attempt.
///
/// `NotFound` is a valid steady-state answer; `TransientError` always means
/// "ask again".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The object exists
    Found,
    /// The store confirmed there is no such object
    NotFound,
    /// The fetch failed for any other reason
    TransientError(String),
}

impl PollOutcome {
    /// True for `Found`
    pub fn is_found(&self) -> bool {
        matches!(self, PollOutcome::Found)
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, PollOutcome::NotFound)
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollOutcome::Found => f.write_str("Found"),
            PollOutcome::NotFound => f.write_str("NotFound"),
            PollOutcome::TransientError(detail) => write!(f, "TransientError({detail})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_scoped_refs_drop_their_namespace() {
        let ns = ResourceRef::new(ResourceKind::Namespace, "gitops-standalone-test", "ignored");
        assert_eq!(ns.namespace(), "");
        assert_eq!(ns.namespace_opt(), None);
        assert_eq!(ns.to_string(), "Namespace/gitops-standalone-test");

        let link = ResourceRef::cluster(ResourceKind::ConsoleLink, "argocd");
        assert_eq!(link.to_string(), "ConsoleLink/argocd");
    }

    #[test]
    fn namespaced_refs_render_kind_namespace_name() {
        let r = ResourceRef::new(ResourceKind::ConfigMap, "argocd-cm", "openshift-gitops");
        assert_eq!(r.kind(), ResourceKind::ConfigMap);
        assert_eq!(r.namespace_opt(), Some("openshift-gitops"));
        assert_eq!(r.to_string(), "ConfigMap/openshift-gitops/argocd-cm");
    }

    #[test]
    fn expectation_names_stay_unique_per_kind() {
        let set = ExpectationSet::new("ns")
            .expect(ResourceKind::Deployment, ["a", "b", "a"])
            .expect(ResourceKind::ConfigMap, ["cm"])
            .expect(ResourceKind::Deployment, ["b", "c"]);

        assert_eq!(set.entries().len(), 2);
        assert_eq!(set.entries()[0].names, vec!["a", "b", "c"]);
        assert_eq!(set.len(), 4);

        let refs: Vec<String> = set.refs().iter().map(|r| r.to_string()).collect();
        assert_eq!(
            refs,
            vec![
                "Deployment/ns/a",
                "Deployment/ns/b",
                "Deployment/ns/c",
                "ConfigMap/ns/cm",
            ]
        );
    }

    #[test]
    fn empty_expectation_set() {
        let set = ExpectationSet::new("ns").expect(ResourceKind::Role, Vec::<String>::new());
        assert!(set.is_empty());
        assert!(set.refs().is_empty());
    }

    #[test]
    fn every_kind_has_consistent_metadata() {
        for kind in ResourceKind::ALL {
            assert!(!kind.api_version().is_empty());
            assert_eq!(kind.to_string(), kind.kind());
            // Core kinds are never served by CRDs
            if !kind.api_version().contains('.') {
                assert!(!kind.is_custom(), "{kind} should be built-in");
            }
        }
        assert_eq!(ResourceKind::ArgoCd.kind(), "ArgoCD");
        assert_eq!(ResourceKind::Image.scope(), Scope::Cluster);
        assert_eq!(ResourceKind::Application.scope(), Scope::Namespaced);
    }

    #[test]
    fn outcomes_render_for_diagnostics() {
        assert_eq!(PollOutcome::Found.to_string(), "Found");
        assert_eq!(PollOutcome::NotFound.to_string(), "NotFound");
        assert_eq!(
            PollOutcome::TransientError("timeout".into()).to_string(),
            "TransientError(timeout)"
        );
        assert!(PollOutcome::Found.is_found());
        assert!(PollOutcome::NotFound.is_not_found());
    }
}
