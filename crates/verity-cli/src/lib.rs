//! verity CLI library

pub mod commands;
pub mod config;
pub mod scenarios;

pub use verity_common::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use verity_common::telemetry::LogFormat;

/// verity - convergence verification for the GitOps operator
#[derive(Parser, Debug)]
#[command(name = "verity")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the kubeconfig (defaults to in-cluster or ~/.kube/config)
    #[arg(long, global = true, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Log output format: text or json
    #[arg(long, global = true, env = "VERITY_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scenario suite and exit non-zero on any failure
    Run(config::RunArgs),
    /// Print scenario names in execution order
    List(config::RunArgs),
    /// Delete a namespace and wait until it is gone
    Reset(commands::reset::ResetArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => commands::run::run(self.kubeconfig.as_deref(), args).await,
            Commands::List(args) => commands::list::run(args),
            Commands::Reset(args) => commands::reset::run(self.kubeconfig.as_deref(), args).await,
        }
    }
}
