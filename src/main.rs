//! storybible - continuity tracking for fiction manuscripts
//!
//! Usage:
//!   storybible scan ch03.md               Scan one scene
//!   storybible scan-all manuscript/       Scan a whole manuscript
//!   storybible conflicts                  List active conflicts
//!   storybible show Elena                 Everything known about an entity
//!   storybible --help                     Show all commands

use anyhow::Result;
use clap::Parser;

use storybible::cli::output::OutputMode;
use storybible::cli::Cli;
use storybible::init::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storybible=info".parse()?),
        )
        .init();

    let mode = OutputMode::from_json_flag(cli.json);

    let ctx = AppContext::new(cli.data_path.clone(), cli.registry.clone()).await?;
    storybible::cli::execute(&cli.command, &ctx, mode).await?;

    Ok(())
}
