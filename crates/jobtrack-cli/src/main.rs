use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::Cli;
use jobtrack_db::{Database, DatabaseConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jobtrack_db=info,jobtrack=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.sqlite {
        Some(path) => DatabaseConfig::sqlite(path.clone()),
        None => DatabaseConfig::from_env()?,
    };
    tracing::debug!(?config, "Database settings");

    // Connecting also migrates the schema
    let db = Database::connect(&config).await?;

    let result = commands::execute(cli.command, &db, cli.json).await;
    db.close().await;
    result
}
