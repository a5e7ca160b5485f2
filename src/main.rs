//! Quickbase CLI
//!
//! Command-line interface for running Quickbase API operations

use anyhow::Context;
use clap::Parser;
use quickbase_client::cli::{Cli, Runner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG directives override --log-level
    let level: tracing::Level = cli.log_level.into();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    let command = cli.command.name();
    Runner::new(cli)
        .run()
        .await
        .with_context(|| format!("qb {command} failed"))
}
