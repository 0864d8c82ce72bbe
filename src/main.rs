use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repobridge::config::{Config, Secrets};
use repobridge::sync::{SyncEngine, SyncOutcome};

#[derive(Parser)]
#[command(name = "repobridge")]
#[command(about = "Bitbucket to GitHub repository migration tool")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: std::path::PathBuf,

    /// Secrets file with Bitbucket and GitHub credentials
    #[arg(short, long, default_value = "secrets.yaml")]
    secrets: std::path::PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting repobridge v{}", env!("CARGO_PKG_VERSION"));

    // Failures before the run loop (config, secrets, discovery) exit
    // non-zero; per-repository failures are reported but do not.
    let config = Config::load(&cli.config)?;
    let secrets = Secrets::load(&cli.secrets)?;

    let engine = SyncEngine::new(config, secrets)?;
    let summary = engine.run().await?;

    println!(
        "Migration complete: {}/{} repositories synced in {:.1}s",
        summary.succeeded,
        summary.total,
        summary.duration.as_secs_f64()
    );

    for outcome in &summary.outcomes {
        if let SyncOutcome::Failed { repo, stage, error } = outcome {
            println!("  failed [{}] {}: {}", stage, repo, error);
        }
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}
