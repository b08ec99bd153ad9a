//! Run configuration
//!
//! Flags become plain values handed to the scenarios. Nothing here is global:
//! two runs with different suffixes in one process never see each other's
//! fixtures.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use verity_engine::Timeouts;

use crate::scenarios::fixtures;
use crate::{Error, Result};

/// How manifests reach the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApplyWith {
    /// Server-side apply through the kube client
    Kube,
    /// `kubectl apply -f`
    Kubectl,
    /// `oc apply -f`
    Oc,
}

/// Flags shared by `run` and `list`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Seconds between poll rounds
    #[arg(long, default_value = "5")]
    pub retry_interval_secs: u64,

    /// Default deadline for a single wait
    #[arg(long, default_value = "120")]
    pub timeout_secs: u64,

    /// Seconds between clean-slate absence checks
    #[arg(long, default_value = "1")]
    pub cleanup_interval_secs: u64,

    /// Deadline for a namespace reset
    #[arg(long, default_value = "60")]
    pub cleanup_timeout_secs: u64,

    /// Deadline for a namespace-scoped Argo CD install to converge
    #[arg(long, default_value = "180")]
    pub install_timeout_secs: u64,

    /// Deadline for an application to become healthy and synced
    #[arg(long, default_value = "60")]
    pub status_timeout_secs: u64,

    /// How long to watch that the operator leaves a manual edit alone
    #[arg(long, default_value = "5")]
    pub observation_window_secs: u64,

    /// Assume the operator is already deployed
    #[arg(long, env = "SKIP_OPERATOR_DEPLOYMENT")]
    pub skip_operator_deployment: bool,

    /// Run only these scenarios (repeatable)
    #[arg(long)]
    pub only: Vec<String>,

    /// Skip these scenarios (repeatable)
    #[arg(long)]
    pub skip: Vec<String>,

    /// Directory holding the Application manifests
    #[arg(long, default_value = "test/yamls")]
    pub manifests_dir: PathBuf,

    /// Manifest apply mechanism
    #[arg(long, value_enum, default_value = "kube")]
    pub apply_with: ApplyWith,

    /// Namespace the operator Deployment runs in
    #[arg(long, default_value = fixtures::OPERATOR_NAMESPACE)]
    pub operator_namespace: String,

    /// Namespace of the default Argo CD instance
    #[arg(long, default_value = fixtures::ARGOCD_NAMESPACE)]
    pub argocd_namespace: String,

    /// Namespace of the GitOps backend service
    #[arg(long, default_value = fixtures::BACKEND_NAMESPACE)]
    pub backend_namespace: String,

    /// Appended to namespaces the suite creates itself; manifests applied
    /// into them are moved to the suffixed name
    #[arg(long)]
    pub run_suffix: Option<String>,
}

/// Names the scenarios operate on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixtures {
    /// Operator Deployment namespace
    pub operator_namespace: String,
    /// Default Argo CD namespace (also the instance name)
    pub argocd_namespace: String,
    /// GitOps backend namespace
    pub backend_namespace: String,
    /// Namespace for the namespace-scoped install
    pub standalone_namespace: String,
    /// Source namespace for the non-default instance
    pub non_default_namespace: String,
    /// Directory holding the Application manifests
    pub manifests_dir: PathBuf,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            operator_namespace: fixtures::OPERATOR_NAMESPACE.to_string(),
            argocd_namespace: fixtures::ARGOCD_NAMESPACE.to_string(),
            backend_namespace: fixtures::BACKEND_NAMESPACE.to_string(),
            standalone_namespace: fixtures::STANDALONE_NAMESPACE.to_string(),
            non_default_namespace: fixtures::NON_DEFAULT_NAMESPACE.to_string(),
            manifests_dir: PathBuf::from("test/yamls"),
        }
    }
}

impl Fixtures {
    /// Path of a manifest inside the manifests directory
    pub fn manifest(&self, file_name: &str) -> PathBuf {
        self.manifests_dir.join(file_name)
    }
}

/// Everything a run needs, validated
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Timing policy
    pub timeouts: Timeouts,
    /// Fixture names
    pub fixtures: Fixtures,
    /// Leave out the operator deployment check
    pub skip_operator_deployment: bool,
    /// Scenario allow-list (empty means all)
    pub only: Vec<String>,
    /// Scenario deny-list
    pub skip: Vec<String>,
    /// Manifest apply mechanism
    pub apply_with: ApplyWith,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            fixtures: Fixtures::default(),
            skip_operator_deployment: false,
            only: Vec::new(),
            skip: Vec::new(),
            apply_with: ApplyWith::Kube,
        }
    }
}

impl TryFrom<RunArgs> for RunConfig {
    type Error = Error;

    fn try_from(args: RunArgs) -> Result<Self> {
        if args.retry_interval_secs == 0 || args.cleanup_interval_secs == 0 {
            return Err(Error::config("poll intervals must be at least one second"));
        }

        let suffixed = |base: &str| match &args.run_suffix {
            Some(suffix) if !suffix.is_empty() => format!("{base}-{suffix}"),
            _ => base.to_string(),
        };
        let standalone_namespace = suffixed(fixtures::STANDALONE_NAMESPACE);
        let non_default_namespace = suffixed(fixtures::NON_DEFAULT_NAMESPACE);
        for namespace in [&standalone_namespace, &non_default_namespace] {
            if namespace.len() > 63 {
                return Err(Error::config(format!(
                    "namespace {namespace} is longer than 63 characters"
                )));
            }
        }

        let timeouts = Timeouts {
            retry_interval: Duration::from_secs(args.retry_interval_secs),
            timeout: Duration::from_secs(args.timeout_secs),
            cleanup_interval: Duration::from_secs(args.cleanup_interval_secs),
            cleanup_timeout: Duration::from_secs(args.cleanup_timeout_secs),
            install_timeout: Duration::from_secs(args.install_timeout_secs),
            status_timeout: Duration::from_secs(args.status_timeout_secs),
            observation_window: Duration::from_secs(args.observation_window_secs),
        };

        let fixtures = Fixtures {
            operator_namespace: args.operator_namespace,
            argocd_namespace: args.argocd_namespace,
            backend_namespace: args.backend_namespace,
            standalone_namespace,
            non_default_namespace,
            manifests_dir: args.manifests_dir,
        };

        Ok(Self {
            timeouts,
            fixtures,
            skip_operator_deployment: args.skip_operator_deployment,
            only: args.only,
            skip: args.skip,
            apply_with: args.apply_with,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> Result<RunConfig> {
        let mut full = vec!["verity"];
        full.extend_from_slice(argv);
        RunConfig::try_from(Harness::try_parse_from(full).unwrap().args)
    }

    #[test]
    fn defaults_match_the_suite_constants() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.fixtures, Fixtures::default());
        assert_eq!(config.apply_with, ApplyWith::Kube);
    }

    #[test]
    fn run_suffix_only_renames_suite_owned_namespaces() {
        let config = parse(&["--run-suffix", "pr42"]).unwrap();
        assert_eq!(config.fixtures.standalone_namespace, "gitops-standalone-test-pr42");
        assert_eq!(config.fixtures.non_default_namespace, "argocd-non-default-source-pr42");
        assert_eq!(config.fixtures.argocd_namespace, "openshift-gitops");
        assert_eq!(config.fixtures.operator_namespace, "openshift-operators");
    }

    #[test]
    fn suffix_too_long_for_the_non_default_namespace_is_rejected() {
        // "gitops-standalone-test-" + 40 fits, "argocd-non-default-source-" + 40 does not
        let suffix = "x".repeat(40);
        let err = parse(&["--run-suffix", suffix.as_str()]).unwrap_err();
        assert!(err.to_string().contains("argocd-non-default-source-"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = parse(&["--retry-interval-secs", "0"]).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn over_long_namespace_is_rejected() {
        let suffix = "x".repeat(60);
        assert!(parse(&["--run-suffix", suffix.as_str()]).is_err());
    }

    #[test]
    fn timing_flags_override_defaults() {
        let config = parse(&["--timeout-secs", "30", "--apply-with", "oc", "--only", "console-link"]).unwrap();
        assert_eq!(config.timeouts.timeout, Duration::from_secs(30));
        assert_eq!(config.apply_with, ApplyWith::Oc);
        assert_eq!(config.only, vec!["console-link"]);
    }

    #[test]
    fn manifest_paths_resolve_under_the_directory() {
        let fixtures = Fixtures::default();
        assert_eq!(fixtures.manifest("image_appcr.yaml"), PathBuf::from("test/yamls/image_appcr.yaml"));
    }
}
