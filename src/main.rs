/// Analytics Regenerator
///
/// Replays a date range through an extract → stage → load pipeline,
/// atomically replacing the corresponding slices of the warehouse tables.
mod cli;
mod config;
mod db;
mod errors;
mod etl;
mod gcp;
mod pipeline;
mod window;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::Parser;
use cli::Cli;
use config::RunConfig;
use db::SourceDatabase;
use gcp::bigquery::BigQueryClient;
use gcp::storage::StagingStore;
use pipeline::Pipeline;
use std::env;
use std::path::PathBuf;
use std::time::Instant;
use window::Windows;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let global_time = Instant::now();

    // Invalid or missing dates never get past clap; the range order is
    // checked here, still before any I/O.
    let cli = Cli::parse();
    cli.validate()?;

    println!("🔄 Starting warehouse regeneration...");
    println!("Configuration:");
    println!("   🌐 environment [{}]", cli.env);
    println!(
        "   📅 date [{}] to [{}]",
        cli.ini.to_rfc3339_opts(SecondsFormat::Millis, true),
        cli.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    println!("   🕐 calculateBy [{}]", cli.by);

    // Pre-flight: config file, environment profile, and every query
    // template are validated before anything is opened.
    let config_path = PathBuf::from(env::var("REGEN_CONFIG").unwrap_or_else(|_| "config/regen.toml".to_string()));
    let config = RunConfig::load(&config_path, &cli.env)?;
    println!("✅ Configuration loaded: {} datasets, bucket [{}]", config.datasets.len(), config.bucket);

    let access_token = env::var("BIGQUERY_ACCESS_TOKEN")
        .context("BIGQUERY_ACCESS_TOKEN not found in environment. Please check your .env file")?;

    let windows = Windows::new(cli.ini, cli.end, cli.by)?;
    println!("   🪟 {} windows to regenerate", windows.len());

    let staging = StagingStore::gcs(&config.bucket)?;
    let warehouse = BigQueryClient::new(&config.project_id, &config.dataset, &access_token);

    println!("\n💾 Connecting to source database...");
    let source = SourceDatabase::connect(&config.database_url).await?;
    source.test_connection().await?;
    println!("✅ Source database connected");

    let pipeline = Pipeline::new(&source, &warehouse, &staging, &config);
    let outcome = pipeline.run(&windows).await;

    // The shared connection is released exactly once, whatever the run
    // outcome was.
    source.close().await;

    println!("\n⏱️  Total time: {}", pipeline::format_duration(global_time.elapsed()));

    match outcome {
        Ok(_stats) => {
            println!("✨ Regeneration complete!");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Regeneration aborted: {}", e);
            Err(e.into())
        }
    }
}
