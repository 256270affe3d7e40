//! cogindex CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cogindex_cli::{Cli, Commands, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch {
            config,
            cache,
            clone_plan,
            concurrency,
        } => cmd::fetch::fetch(&config, &cache, &clone_plan, concurrency).await,
        Commands::Build {
            config,
            cache,
            out,
            metadata,
            require_marker,
            ban_match,
            concurrency,
        } => {
            cmd::build::build(
                &config,
                &cache,
                &out,
                &metadata,
                require_marker,
                ban_match.into(),
                concurrency,
            )
            .await
        }
    }
}
