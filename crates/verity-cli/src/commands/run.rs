//! Run command - execute the scenario suite against a live cluster

use std::path::Path;

use tracing::info;

use verity_engine::{RunReport, ScenarioRunner, VerifyContext};

use crate::config::{RunArgs, RunConfig};
use crate::scenarios::{catalogue, select};
use crate::Result;

/// Suite name used in the run summary
pub const SUITE: &str = "gitops operator";

/// Run the selected catalogue on `ctx` and return the report
pub async fn execute(config: &RunConfig, ctx: VerifyContext) -> Result<RunReport> {
    let scenarios = select(catalogue(config), &config.only, &config.skip)?;
    info!(
        scenarios = scenarios.len(),
        names = %scenarios.iter().map(|s| s.name()).collect::<Vec<_>>().join(","),
        "starting run"
    );

    let runner = ScenarioRunner::new(SUITE, ctx)
        .with_clean_slate([config.fixtures.standalone_namespace.as_str()]);
    let report = runner.run(&scenarios).await;
    report.log_summary();
    Ok(report)
}

/// Run the run command
pub async fn run(kubeconfig: Option<&Path>, args: RunArgs) -> Result<()> {
    let config = RunConfig::try_from(args)?;
    let ctx = super::cluster_context(kubeconfig, config.apply_with, config.timeouts).await?;
    execute(&config, ctx).await?.into_result()
}
