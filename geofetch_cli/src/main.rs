mod commands;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geofetch_lib::Settings;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "geofetch")]
#[command(about = "Cached data fetching and rate-limited reverse geocoding")]
struct Cli {
    /// Output format: table or json
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// Path to a geofetch.toml settings file
    #[arg(long, global = true, env = "GEOFETCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn coordinates into display addresses
    Resolve(commands::resolve::ResolveArgs),
    /// Fetch a JSON endpoint through the TTL cache
    Fetch(commands::fetch::FetchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("geofetch=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.output);
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match &cli.command {
        Commands::Resolve(args) => commands::resolve::run(args, &settings, format).await?,
        Commands::Fetch(args) => commands::fetch::run(args, &settings, format).await?,
    }

    Ok(())
}
