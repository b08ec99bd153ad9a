//! Scenario Runner
//!
//! Runs verification scenarios in order and reports every outcome. A failing
//! scenario never stops the ones after it unless they declared it as a
//! requirement. The exception is a failed clean slate: once a baseline could
//! not be established nothing later in the run can be trusted, so the rest
//! of the run is skipped.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::context::VerifyContext;
use crate::{Error, Result};

/// One independent verification unit
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Unique name, used in reports and for `requires`
    fn name(&self) -> &str;

    /// Scenarios that must have passed earlier in the same run
    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    /// Namespaces to reset before the trigger runs
    fn clean_slate(&self) -> Vec<String> {
        Vec::new()
    }

    /// Cause the reconciler to act (create a resource, apply a manifest)
    async fn trigger(&self, _ctx: &VerifyContext) -> Result<()> {
        Ok(())
    }

    /// Assert the reconciler's side effects
    async fn verify(&self, ctx: &VerifyContext) -> Result<()>;
}

/// Where a scenario is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioState {
    /// Not started
    Init,
    /// Resetting its namespaces
    Reset,
    /// Triggering the reconciler
    Trigger,
    /// Waiting on postconditions
    Polling,
    /// Passed
    Satisfied,
    /// A wait ran out of time
    TimedOut,
    /// An assertion, trigger or cleanup failed, or the scenario panicked
    Failed,
    /// Not run
    Skipped,
}

impl ScenarioState {
    /// True for `Satisfied`, `TimedOut`, `Failed` and `Skipped`
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScenarioState::Satisfied
                | ScenarioState::TimedOut
                | ScenarioState::Failed
                | ScenarioState::Skipped
        )
    }

    /// True for outcomes that fail the run
    pub fn is_failure(self) -> bool {
        matches!(self, ScenarioState::TimedOut | ScenarioState::Failed)
    }

    fn tag(self) -> &'static str {
        match self {
            ScenarioState::Satisfied => "PASS",
            ScenarioState::TimedOut => "TIME",
            ScenarioState::Failed => "FAIL",
            ScenarioState::Skipped => "SKIP",
            _ => "....",
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioState::Init => "init",
            ScenarioState::Reset => "reset",
            ScenarioState::Trigger => "trigger",
            ScenarioState::Polling => "polling",
            ScenarioState::Satisfied => "satisfied",
            ScenarioState::TimedOut => "timed out",
            ScenarioState::Failed => "failed",
            ScenarioState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Outcome of one scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Terminal state
    pub state: ScenarioState,
    /// Wall time spent in the scenario
    pub duration: Duration,
    /// Failure or skip reason
    pub detail: Option<String>,
}

impl ScenarioReport {
    fn skipped(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            state: ScenarioState::Skipped,
            duration: Duration::ZERO,
            detail: Some(reason.into()),
        }
    }

    /// True when the scenario reached `Satisfied`
    pub fn passed(&self) -> bool {
        self.state == ScenarioState::Satisfied
    }
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Suite name
    pub suite: String,
    /// One entry per scenario, in execution order
    pub scenarios: Vec<ScenarioReport>,
    /// Set when a clean-slate failure cut the run short
    pub aborted: Option<String>,
}

impl RunReport {
    /// Scenarios that timed out or failed
    pub fn failures(&self) -> Vec<&ScenarioReport> {
        self.scenarios.iter().filter(|r| r.state.is_failure()).collect()
    }

    /// Number of scenarios in `state`
    pub fn count(&self, state: ScenarioState) -> usize {
        self.scenarios.iter().filter(|r| r.state == state).count()
    }

    /// Report for `name`
    pub fn get(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|r| r.name == name)
    }

    /// True when nothing failed and the run was not aborted
    pub fn passed(&self) -> bool {
        self.aborted.is_none() && self.failures().is_empty()
    }

    /// Log a PASS/FAIL/SKIP table
    pub fn log_summary(&self) {
        let total: Duration = self.scenarios.iter().map(|r| r.duration).sum();

        info!("========================================");
        info!("  {}", self.suite.to_uppercase());
        info!("========================================");
        for r in &self.scenarios {
            info!(
                "  {}  {:40} {:.1}s",
                r.state.tag(),
                r.name,
                r.duration.as_secs_f64()
            );
            if let Some(detail) = &r.detail {
                // Long diagnostics stay in the per-scenario logs
                let truncated: String = detail.chars().take(200).collect();
                info!("        -> {truncated}");
            }
        }
        info!("----------------------------------------");
        info!(
            "  {} passed, {} failed, {} timed out, {} skipped ({:.1}s total)",
            self.count(ScenarioState::Satisfied),
            self.count(ScenarioState::Failed),
            self.count(ScenarioState::TimedOut),
            self.count(ScenarioState::Skipped),
            total.as_secs_f64()
        );
        if let Some(reason) = &self.aborted {
            info!("  run aborted: {reason}");
        }
        info!("========================================");
    }

    /// `Err(ScenariosFailed)` naming every failed scenario
    pub fn into_result(self) -> Result<()> {
        let mut names: Vec<String> = self.failures().iter().map(|r| r.name.clone()).collect();
        if names.is_empty() {
            match self.aborted {
                // A pre-run reset failure leaves no individual scenario to blame
                Some(reason) => names.push(format!("clean slate ({reason})")),
                None => return Ok(()),
            }
        }
        Err(Error::ScenariosFailed {
            suite: self.suite,
            failed: names.len(),
            names: names.join(", "),
        })
    }
}

/// Sequences scenarios against one [`VerifyContext`]
pub struct ScenarioRunner {
    suite: String,
    ctx: VerifyContext,
    clean_slate: Vec<String>,
}

impl ScenarioRunner {
    /// Runner for `suite`
    pub fn new(suite: impl Into<String>, ctx: VerifyContext) -> Self {
        Self {
            suite: suite.into(),
            ctx,
            clean_slate: Vec::new(),
        }
    }

    /// Namespaces reset once before the first scenario
    pub fn with_clean_slate<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clean_slate = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Run `scenarios` in order
    pub async fn run(&self, scenarios: &[Arc<dyn Scenario>]) -> RunReport {
        if let Err(e) = self.pre_run_reset().await {
            return self.aborted_before_start(scenarios, e);
        }
        let abort = OnceLock::new();
        let reports = self.run_sequence(scenarios, &abort).await;
        RunReport {
            suite: self.suite.clone(),
            scenarios: reports,
            aborted: abort.into_inner(),
        }
    }

    /// Run independent groups concurrently, each group in order.
    ///
    /// Groups must not share clean-slate namespaces, and a requirement must
    /// live in the same group as the scenario that declares it. A failed
    /// clean slate in any group skips whatever has not started in every group.
    pub async fn run_partitioned(&self, groups: &[Vec<Arc<dyn Scenario>>]) -> Result<RunReport> {
        validate_partition(groups)?;

        let all: Vec<Arc<dyn Scenario>> = groups.iter().flatten().cloned().collect();
        if let Err(e) = self.pre_run_reset().await {
            return Ok(self.aborted_before_start(&all, e));
        }

        info!(suite = %self.suite, groups = groups.len(), "running scenario groups concurrently");
        let abort = OnceLock::new();
        let results = join_all(groups.iter().map(|group| self.run_sequence(group, &abort))).await;

        Ok(RunReport {
            suite: self.suite.clone(),
            scenarios: results.into_iter().flatten().collect(),
            aborted: abort.into_inner(),
        })
    }

    async fn pre_run_reset(&self) -> Result<()> {
        for namespace in &self.clean_slate {
            info!(suite = %self.suite, namespace = %namespace, "run-level clean slate");
            self.ctx.reset(namespace).await?;
        }
        Ok(())
    }

    fn aborted_before_start(&self, scenarios: &[Arc<dyn Scenario>], e: Error) -> RunReport {
        error!(suite = %self.suite, error = %e, "run-level clean slate failed, nothing will run");
        let reason = e.to_string();
        RunReport {
            suite: self.suite.clone(),
            scenarios: scenarios
                .iter()
                .map(|s| ScenarioReport::skipped(s.name(), format!("run aborted: {reason}")))
                .collect(),
            aborted: Some(reason),
        }
    }

    /// `abort` is shared by every sequence in the run; the first fatal error
    /// sets it and each sequence checks it before starting a scenario.
    async fn run_sequence(
        &self,
        scenarios: &[Arc<dyn Scenario>],
        abort: &OnceLock<String>,
    ) -> Vec<ScenarioReport> {
        let in_run: HashSet<&str> = scenarios.iter().map(|s| s.name()).collect();
        let mut outcomes: BTreeMap<String, ScenarioState> = BTreeMap::new();
        let mut reports = Vec::with_capacity(scenarios.len());

        for scenario in scenarios {
            let name = scenario.name();

            if let Some(reason) = abort.get() {
                reports.push(ScenarioReport::skipped(name, format!("run aborted: {reason}")));
                continue;
            }

            if let Some(reason) = unmet_requirement(scenario.as_ref(), &in_run, &outcomes) {
                warn!(scenario = %name, reason = %reason, "skipping scenario");
                outcomes.insert(name.to_string(), ScenarioState::Skipped);
                reports.push(ScenarioReport::skipped(name, reason));
                continue;
            }

            let (report, fatal) = self.run_one(scenario.as_ref()).await;
            if let Some(e) = fatal {
                error!(scenario = %name, error = %e, "clean slate failed, aborting remaining scenarios");
                // Only the first fatal error names the abort
                let _ = abort.set(e);
            }
            outcomes.insert(name.to_string(), report.state);
            reports.push(report);
        }

        reports
    }

    async fn run_one(&self, scenario: &dyn Scenario) -> (ScenarioReport, Option<String>) {
        let name = scenario.name();
        let start = Instant::now();
        let mut phase = ScenarioState::Init;
        info!(scenario = %name, "starting scenario");

        let outcome = AssertUnwindSafe(self.drive(scenario, &mut phase))
            .catch_unwind()
            .await;

        let mut fatal = None;
        let (state, detail) = match outcome {
            Ok(Ok(())) => (ScenarioState::Satisfied, None),
            Ok(Err(e)) => {
                let detail = format!("{phase}: {e}");
                if e.is_fatal() {
                    fatal = Some(e.to_string());
                    (ScenarioState::Failed, Some(detail))
                } else if e.is_timeout() {
                    (ScenarioState::TimedOut, Some(detail))
                } else {
                    (ScenarioState::Failed, Some(detail))
                }
            }
            Err(panic) => {
                let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                (ScenarioState::Failed, Some(format!("{phase}: PANIC: {msg}")))
            }
        };

        let duration = start.elapsed();
        match &detail {
            None => info!(
                scenario = %name,
                elapsed_ms = duration.as_millis() as u64,
                "scenario satisfied"
            ),
            Some(d) => warn!(
                scenario = %name,
                state = %state,
                elapsed_ms = duration.as_millis() as u64,
                detail = %d,
                "scenario did not pass"
            ),
        }

        let report = ScenarioReport {
            name: name.to_string(),
            state,
            duration,
            detail,
        };
        (report, fatal)
    }

    async fn drive(&self, scenario: &dyn Scenario, phase: &mut ScenarioState) -> Result<()> {
        let name = scenario.name();

        *phase = ScenarioState::Reset;
        for namespace in scenario.clean_slate() {
            info!(scenario = %name, namespace = %namespace, "resetting namespace");
            self.ctx.reset(&namespace).await?;
        }

        *phase = ScenarioState::Trigger;
        scenario.trigger(&self.ctx).await?;

        *phase = ScenarioState::Polling;
        scenario.verify(&self.ctx).await
    }
}

/// Reason to skip `scenario`, if a requirement in this run did not pass.
///
/// A requirement that is not part of the run at all is assumed to have been
/// established by an earlier run.
fn unmet_requirement(
    scenario: &dyn Scenario,
    in_run: &HashSet<&str>,
    outcomes: &BTreeMap<String, ScenarioState>,
) -> Option<String> {
    for required in scenario.requires() {
        if !in_run.contains(required.as_str()) {
            warn!(
                scenario = %scenario.name(),
                requires = %required,
                "requirement not in this run, assuming it is already satisfied"
            );
            continue;
        }
        match outcomes.get(&required) {
            Some(ScenarioState::Satisfied) => {}
            Some(state) => return Some(format!("requires {required}, which was {state}")),
            None => return Some(format!("requires {required}, which has not run yet")),
        }
    }
    None
}

fn validate_partition(groups: &[Vec<Arc<dyn Scenario>>]) -> Result<()> {
    let mut namespace_owner: BTreeMap<String, usize> = BTreeMap::new();
    let mut scenario_group: BTreeMap<String, usize> = BTreeMap::new();

    for (index, group) in groups.iter().enumerate() {
        for scenario in group {
            scenario_group.insert(scenario.name().to_string(), index);
            for namespace in scenario.clean_slate() {
                match namespace_owner.get(&namespace) {
                    Some(&owner) if owner != index => {
                        return Err(Error::config(format!(
                            "namespace {namespace} is reset by groups {owner} and {index}"
                        )));
                    }
                    _ => {
                        namespace_owner.insert(namespace, index);
                    }
                }
            }
        }
    }

    for (index, group) in groups.iter().enumerate() {
        for scenario in group {
            for required in scenario.requires() {
                if let Some(&other) = scenario_group.get(&required) {
                    if other != index {
                        return Err(Error::config(format!(
                            "{} requires {required}, which is in another group",
                            scenario.name()
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Timeouts;
    use crate::fake::FakeCluster;
    use crate::resource::{ExpectationSet, ResourceKind, ResourceRef};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scenario whose verify is a closure over the context
    struct Stub {
        name: &'static str,
        requires: Vec<String>,
        clean_slate: Vec<String>,
        calls: Arc<AtomicU32>,
        verdict: fn(&VerifyContext) -> Result<()>,
    }

    impl Stub {
        fn new(name: &'static str, verdict: fn(&VerifyContext) -> Result<()>) -> Self {
            Self {
                name,
                requires: Vec::new(),
                clean_slate: Vec::new(),
                calls: Arc::new(AtomicU32::new(0)),
                verdict,
            }
        }

        fn after(mut self, name: &str) -> Self {
            self.requires.push(name.to_string());
            self
        }

        fn resetting(mut self, namespace: &str) -> Self {
            self.clean_slate.push(namespace.to_string());
            self
        }
    }

    #[async_trait]
    impl Scenario for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn requires(&self) -> Vec<String> {
            self.requires.clone()
        }

        fn clean_slate(&self) -> Vec<String> {
            self.clean_slate.clone()
        }

        async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.verdict)(ctx)
        }
    }

    fn pass(_: &VerifyContext) -> Result<()> {
        Ok(())
    }

    fn mismatch(_: &VerifyContext) -> Result<()> {
        Err(Error::assertion_mismatch("ArgoCD/openshift-gitops/openshift-gitops", "spec.disableAdmin", true, false))
    }

    fn timeout(_: &VerifyContext) -> Result<()> {
        Err(Error::deadline_exceeded("things", Duration::from_secs(120), "NotFound"))
    }

    fn boom(_: &VerifyContext) -> Result<()> {
        panic!("scenario exploded")
    }

    fn runner(cluster: Arc<FakeCluster>) -> ScenarioRunner {
        let ctx = VerifyContext::for_cluster(cluster.clone(), cluster, Timeouts::default());
        ScenarioRunner::new("gitops operator", ctx)
    }

    fn scenarios(list: Vec<Stub>) -> Vec<Arc<dyn Scenario>> {
        list.into_iter().map(|p| Arc::new(p) as Arc<dyn Scenario>).collect()
    }

    // ==========================================================================
    // Story: Failures are isolated and all reported
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn every_scenario_runs_even_after_failures() {
        let list = scenarios(vec![
            Stub::new("a", mismatch),
            Stub::new("b", timeout),
            Stub::new("c", boom),
            Stub::new("d", pass),
        ]);

        let report = runner(Arc::new(FakeCluster::new())).run(&list).await;

        assert_eq!(report.get("a").unwrap().state, ScenarioState::Failed);
        assert_eq!(report.get("b").unwrap().state, ScenarioState::TimedOut);
        assert_eq!(report.get("c").unwrap().state, ScenarioState::Failed);
        assert!(report.get("c").unwrap().detail.as_ref().unwrap().contains("PANIC: scenario exploded"));
        assert!(report.get("d").unwrap().passed());
        assert!(!report.passed());

        report.log_summary();
        let err = report.into_result().unwrap_err();
        assert!(matches!(err, Error::ScenariosFailed { failed: 3, ref names, .. } if names == "a, b, c"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_detail_names_the_phase() {
        let list = scenarios(vec![Stub::new("install", timeout)]);
        let report = runner(Arc::new(FakeCluster::new())).run(&list).await;
        let detail = report.get("install").unwrap().detail.clone().unwrap();
        assert!(detail.starts_with("polling: timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn all_passing_run_is_ok() {
        let list = scenarios(vec![Stub::new("a", pass), Stub::new("b", pass)]);
        let report = runner(Arc::new(FakeCluster::new())).run(&list).await;
        assert_eq!(report.count(ScenarioState::Satisfied), 2);
        assert!(report.into_result().is_ok());
    }

    // ==========================================================================
    // Story: Explicit ordering dependencies
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn dependent_is_skipped_when_its_requirement_fails() {
        let teardown = Stub::new("argocd-teardown", pass).after("argocd-installation");
        let calls = teardown.calls.clone();
        let list = scenarios(vec![
            Stub::new("argocd-installation", timeout),
            Stub::new("argocd-metrics", pass),
            teardown,
        ]);

        let report = runner(Arc::new(FakeCluster::new())).run(&list).await;

        let skipped = report.get("argocd-teardown").unwrap();
        assert_eq!(skipped.state, ScenarioState::Skipped);
        assert!(skipped.detail.as_ref().unwrap().contains("timed out"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.get("argocd-metrics").unwrap().passed());
    }

    #[tokio::test(start_paused = true)]
    async fn requirement_declared_later_is_not_yet_satisfied() {
        let list = scenarios(vec![
            Stub::new("teardown", pass).after("install"),
            Stub::new("install", pass),
        ]);
        let report = runner(Arc::new(FakeCluster::new())).run(&list).await;
        assert_eq!(report.get("teardown").unwrap().state, ScenarioState::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn requirement_outside_the_run_is_assumed_met() {
        let list = scenarios(vec![Stub::new("teardown", pass).after("install")]);
        let report = runner(Arc::new(FakeCluster::new())).run(&list).await;
        assert!(report.get("teardown").unwrap().passed());
    }

    // ==========================================================================
    // Story: Clean slate before a scenario
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn scenario_namespaces_are_reset_before_verify() {
        let cluster = Arc::new(FakeCluster::new());
        let ns = ResourceRef::namespace_object("gitops-standalone-test");
        cluster.insert(&ns, json!({}));
        cluster.linger_on_delete(&ns, 2);

        let list = scenarios(vec![Stub::new("standalone", pass).resetting("gitops-standalone-test")]);
        let report = runner(cluster.clone()).run(&list).await;

        assert!(report.passed());
        assert_eq!(cluster.deleted(), vec![ns.clone()]);
        assert!(!cluster.contains(&ns));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_clean_slate_aborts_the_rest_of_the_run() {
        let cluster = Arc::new(FakeCluster::new());
        let ns = ResourceRef::namespace_object("gitops-standalone-test");
        cluster.insert(&ns, json!({}));
        cluster.linger_on_delete(&ns, u32::MAX);

        let later = Stub::new("later", pass);
        let calls = later.calls.clone();
        let list = scenarios(vec![
            Stub::new("first", pass),
            Stub::new("standalone", pass).resetting("gitops-standalone-test"),
            later,
        ]);

        let report = runner(cluster).run(&list).await;

        assert!(report.get("first").unwrap().passed());
        let stuck = report.get("standalone").unwrap();
        assert_eq!(stuck.state, ScenarioState::Failed);
        assert!(stuck.detail.as_ref().unwrap().starts_with("reset: clean slate failed"));
        assert_eq!(report.get("later").unwrap().state, ScenarioState::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.aborted.is_some());
        assert!(report.into_result().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn run_level_clean_slate_failure_skips_everything() {
        let cluster = Arc::new(FakeCluster::new());
        let ns = ResourceRef::namespace_object("leftover");
        cluster.insert(&ns, json!({}));
        cluster.linger_on_delete(&ns, u32::MAX);

        let list = scenarios(vec![Stub::new("a", pass), Stub::new("b", pass)]);
        let report = runner(cluster).with_clean_slate(["leftover"]).run(&list).await;

        assert_eq!(report.count(ScenarioState::Skipped), 2);
        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("clean slate"));
    }

    // ==========================================================================
    // Story: Partitioned groups
    // ==========================================================================

    #[tokio::test(start_paused = true)]
    async fn groups_run_concurrently_and_keep_their_own_order() {
        let cluster = Arc::new(FakeCluster::new());
        let set = ExpectationSet::new("group-a").expect(ResourceKind::ConfigMap, ["argocd-cm"]);
        cluster.appear_after(&set.refs()[0], 3);
        cluster.insert(&set.refs()[0], json!({}));

        struct Waits(ExpectationSet);

        #[async_trait]
        impl Scenario for Waits {
            fn name(&self) -> &str {
                "waits"
            }
            async fn verify(&self, ctx: &VerifyContext) -> Result<()> {
                ctx.converge(&self.0, Duration::from_secs(60)).await.map(|_| ())
            }
        }

        let groups: Vec<Vec<Arc<dyn Scenario>>> = vec![
            vec![Arc::new(Waits(set)), Arc::new(Stub::new("after-waits", pass))],
            vec![Arc::new(Stub::new("other", pass))],
        ];

        let start = Instant::now();
        let report = runner(cluster).run_partitioned(&groups).await.unwrap();

        assert!(report.passed());
        assert_eq!(report.scenarios.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_clean_slate_in_one_group_skips_the_rest_of_every_group() {
        let cluster = Arc::new(FakeCluster::new());
        let ns = ResourceRef::namespace_object("stuck");
        cluster.insert(&ns, json!({}));
        cluster.linger_on_delete(&ns, u32::MAX);

        struct Sleeps;

        #[async_trait]
        impl Scenario for Sleeps {
            fn name(&self) -> &str {
                "sleeps"
            }
            async fn verify(&self, _ctx: &VerifyContext) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok(())
            }
        }

        let late = Stub::new("late", pass);
        let calls = late.calls.clone();
        let groups: Vec<Vec<Arc<dyn Scenario>>> = vec![
            scenarios(vec![Stub::new("standalone", pass).resetting("stuck")]),
            vec![Arc::new(Sleeps), Arc::new(late)],
        ];

        let report = runner(cluster).run_partitioned(&groups).await.unwrap();

        assert_eq!(report.get("standalone").unwrap().state, ScenarioState::Failed);
        // Already running when the abort landed, so it finishes
        assert!(report.get("sleeps").unwrap().passed());
        let skipped = report.get("late").unwrap();
        assert_eq!(skipped.state, ScenarioState::Skipped);
        assert!(skipped.detail.as_ref().unwrap().starts_with("run aborted: clean slate failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.aborted.as_deref().unwrap().contains("stuck"));
    }

    #[tokio::test]
    async fn groups_sharing_a_namespace_are_rejected() {
        let groups: Vec<Vec<Arc<dyn Scenario>>> = vec![
            scenarios(vec![Stub::new("a", pass).resetting("shared")]),
            scenarios(vec![Stub::new("b", pass).resetting("shared")]),
        ];
        let err = runner(Arc::new(FakeCluster::new()))
            .run_partitioned(&groups)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn cross_group_requirements_are_rejected() {
        let groups: Vec<Vec<Arc<dyn Scenario>>> = vec![
            scenarios(vec![Stub::new("install", pass)]),
            scenarios(vec![Stub::new("teardown", pass).after("install")]),
        ];
        assert!(runner(Arc::new(FakeCluster::new()))
            .run_partitioned(&groups)
            .await
            .is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!ScenarioState::Polling.is_terminal());
        assert!(ScenarioState::Skipped.is_terminal());
        assert!(!ScenarioState::Skipped.is_failure());
        assert!(ScenarioState::TimedOut.is_failure());
    }
}
