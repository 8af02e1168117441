mod cli;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use tfprune::app::{self, RunConfig};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config: RunConfig = Cli::parse().into();
    let summary = app::run(&config).await?;

    if config.dry_run {
        for row in &summary.removed {
            println!("{}\t{}\t{}", row.path.display(), row.kind, row.target);
        }
    }

    tracing::info!(
        files = summary.files_scanned,
        rewritten = summary.files_rewritten,
        directives = summary.removed.len(),
        dry_run = config.dry_run,
        "cleanup complete"
    );

    Ok(())
}
