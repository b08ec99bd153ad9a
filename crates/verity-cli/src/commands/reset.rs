//! Reset command - delete a namespace and wait until the cluster forgets it

use std::path::Path;
use std::time::{Duration, Instant};

use clap::Args;
use tracing::info;

use verity_engine::Timeouts;

use crate::config::ApplyWith;
use crate::{Error, Result};

/// Reset command arguments
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Namespace to delete (repeatable)
    #[arg(long, short = 'n', required = true)]
    pub namespace: Vec<String>,

    /// Seconds between absence checks
    #[arg(long, default_value = "1")]
    pub cleanup_interval_secs: u64,

    /// Give up if a namespace is still present after this many seconds
    #[arg(long, default_value = "60")]
    pub cleanup_timeout_secs: u64,
}

impl ResetArgs {
    fn timeouts(&self) -> Result<Timeouts> {
        if self.cleanup_interval_secs == 0 {
            return Err(Error::config("cleanup interval must be at least one second"));
        }
        Ok(Timeouts {
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            cleanup_timeout: Duration::from_secs(self.cleanup_timeout_secs),
            ..Timeouts::default()
        })
    }
}

/// Run the reset command
pub async fn run(kubeconfig: Option<&Path>, args: ResetArgs) -> Result<()> {
    let timeouts = args.timeouts()?;
    let ctx = super::cluster_context(kubeconfig, ApplyWith::Kube, timeouts).await?;

    for namespace in &args.namespace {
        let start = Instant::now();
        ctx.reset(namespace).await?;
        info!(namespace = %namespace, elapsed_secs = start.elapsed().as_secs_f64(), "namespace is gone");
    }
    Ok(())
}
