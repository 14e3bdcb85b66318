//! ytscribe CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ytscribe::cli::{commands, Cli, Commands};
use ytscribe::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ytscribe={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.as_ref().map(|p| Settings::expand_path(p));
    let load_settings = || Settings::load_from(config_path.as_ref());

    match &cli.command {
        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, load_settings()?).await?;
        }

        Commands::Fetch { video, format, output } => {
            commands::run_fetch(video, *format, output.clone(), load_settings()?).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&load_settings()?, config_path.as_deref()).await?;
        }

        // `path` and `init` must work without a valid config file
        Commands::Config { action } => {
            commands::run_config(action, config_path.clone())?;
        }
    }

    Ok(())
}
