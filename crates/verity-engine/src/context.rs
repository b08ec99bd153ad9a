//! Everything a scenario needs to trigger and verify
//!
//! The context bundles the engine seams with the run's timing policy and
//! exposes the pollers as `Result`-returning assertions, so a scenario reads
//! as a straight sequence of `?` steps.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::absence::watch_absence;
use crate::accessor::{fetch_timeout, read_bounded, ResourceAccessor, ResourceMutator};
use crate::clean_slate;
use crate::convergence::{await_all, ConvergenceResult};
use crate::manifest::ManifestApplier;
use crate::resource::{ExpectationSet, ResourceRef};
use crate::status::{await_object, check_status, ApplicationStatusProvider, StatusTarget};
use crate::{Error, Result};

/// Timing policy for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Cadence of convergence, absence and status rounds
    pub retry_interval: Duration,
    /// Default deadline for a single wait
    pub timeout: Duration,
    /// Cadence of clean-slate absence rounds
    pub cleanup_interval: Duration,
    /// Deadline for a clean-slate reset
    pub cleanup_timeout: Duration,
    /// Deadline for a full instance install to converge
    pub install_timeout: Duration,
    /// Deadline for an application to become healthy and synced
    pub status_timeout: Duration,
    /// How long to watch for a reconciler NOT acting
    pub observation_window: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
            cleanup_interval: Duration::from_secs(1),
            cleanup_timeout: Duration::from_secs(60),
            install_timeout: Duration::from_secs(180),
            status_timeout: Duration::from_secs(60),
            observation_window: Duration::from_secs(5),
        }
    }
}

/// Shared handles and policy passed to every scenario
#[derive(Clone)]
pub struct VerifyContext {
    accessor: Arc<dyn ResourceAccessor>,
    mutator: Arc<dyn ResourceMutator>,
    status: Arc<dyn ApplicationStatusProvider>,
    applier: Arc<dyn ManifestApplier>,
    timeouts: Timeouts,
}

impl VerifyContext {
    /// Context over explicit seams
    pub fn new(
        accessor: Arc<dyn ResourceAccessor>,
        mutator: Arc<dyn ResourceMutator>,
        status: Arc<dyn ApplicationStatusProvider>,
        applier: Arc<dyn ManifestApplier>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            accessor,
            mutator,
            status,
            applier,
            timeouts,
        }
    }

    /// Context where one backend serves reads, mutations and status
    pub fn for_cluster<C>(cluster: Arc<C>, applier: Arc<dyn ManifestApplier>, timeouts: Timeouts) -> Self
    where
        C: ResourceAccessor + ResourceMutator + ApplicationStatusProvider + 'static,
    {
        Self::new(cluster.clone(), cluster.clone(), cluster, applier, timeouts)
    }

    /// Timing policy
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Read-only store access
    pub fn accessor(&self) -> &dyn ResourceAccessor {
        self.accessor.as_ref()
    }

    /// Controlled mutations
    pub fn mutator(&self) -> &dyn ResourceMutator {
        self.mutator.as_ref()
    }

    /// Manifest applier
    pub fn applier(&self) -> &dyn ManifestApplier {
        self.applier.as_ref()
    }

    /// Wait for every expectation, failing with the per-resource picture
    pub async fn converge(
        &self,
        expectations: &ExpectationSet,
        deadline: Duration,
    ) -> Result<ConvergenceResult> {
        let description = format!("resources in namespace {}", expectations.namespace());
        await_all(
            self.accessor(),
            expectations,
            self.timeouts.retry_interval,
            deadline,
        )
        .await
        .into_result(&description)
    }

    /// Wait for `target` to be gone
    pub async fn require_gone(&self, target: &ResourceRef, deadline: Duration) -> Result<()> {
        let absence = watch_absence(self.accessor(), target, self.timeouts.retry_interval, deadline).await;
        if absence.gone {
            Ok(())
        } else {
            Err(Error::deadline_exceeded(
                format!("{target} to be deleted"),
                absence.elapsed,
                absence.last_outcome.to_string(),
            ))
        }
    }

    /// Wait for an application's health and sync predicates to co-occur
    pub async fn require_status(&self, target: &StatusTarget, deadline: Duration) -> Result<()> {
        let result = check_status(
            self.status.as_ref(),
            target,
            self.timeouts.retry_interval,
            deadline,
        )
        .await;
        if result.satisfied {
            Ok(())
        } else {
            let last = match result.last_observed {
                Some(s) => format!(
                    "health={} sync={}",
                    s.health.as_deref().unwrap_or("<none>"),
                    s.sync.as_deref().unwrap_or("<none>")
                ),
                None => "no status observed".to_string(),
            };
            Err(Error::deadline_exceeded(
                format!(
                    "application {}/{} to become healthy and synced",
                    target.namespace, target.resource_name
                ),
                result.elapsed,
                last,
            ))
        }
    }

    /// Wait for `target` to satisfy `predicate`, returning the object
    pub async fn require_object<P>(
        &self,
        target: &ResourceRef,
        what: &str,
        predicate: P,
        deadline: Duration,
    ) -> Result<Value>
    where
        P: Fn(&Value) -> bool,
    {
        let wait = await_object(
            self.accessor(),
            target,
            predicate,
            self.timeouts.retry_interval,
            deadline,
        )
        .await;
        match (wait.satisfied, wait.last_object) {
            (true, Some(object)) => Ok(object),
            (_, last) => Err(Error::deadline_exceeded(
                format!("{target} to be {what}"),
                wait.elapsed,
                if last.is_some() { "present, condition not met" } else { "not found" },
            )),
        }
    }

    /// Read an object that must exist right now
    pub async fn read_existing(&self, target: &ResourceRef) -> Result<Value> {
        let limit = fetch_timeout(self.timeouts.retry_interval);
        read_bounded(self.accessor(), target, limit)
            .await?
            .ok_or_else(|| Error::assertion_mismatch(target.to_string(), "existence", "present", "absent"))
    }

    /// Clean-slate reset of `namespace` with the run's cleanup timing
    pub async fn reset(&self, namespace: &str) -> Result<()> {
        clean_slate::reset(
            self.accessor(),
            self.mutator(),
            namespace,
            self.timeouts.cleanup_interval,
            self.timeouts.cleanup_timeout,
        )
        .await
    }

    /// Give the reconciler a bounded chance to act before checking that it
    /// did not.
    ///
    /// There is no observable signal for "the reconciler decided to leave
    /// this alone", so a quiet window only shows nothing changed within it.
    /// A slower reconciler can still act afterwards.
    pub async fn observation_window(&self) {
        let window = self.timeouts.observation_window;
        warn!(
            window_secs = window.as_secs_f64(),
            "waiting a fixed observation window; absence of a change is not proof the reconciler will not act"
        );
        tokio::time::sleep(window).await;
        info!("observation window elapsed");
    }
}
