//! verity
//!
//! Verifies that the GitOps operator drove the cluster into the expected
//! state.

use clap::Parser;

use verity_cli::{Cli, Result};
use verity_common::telemetry::init_logging;
use verity_common::Error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format).map_err(|e| Error::config(e.to_string()))?;
    cli.run().await
}
