mod config;
mod telemetry;

use aggregator::config::{API_KEY_ENV_VAR, ApiKey};
use aggregator::errors::AggregatorError;
use clap::{Args, Parser};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process;
use telemetry::TelemetryError;

#[derive(Parser)]
#[command(name = "terrascope", version, about = "Geospatial data aggregation proxy")]
enum CliCommand {
    /// Serve the aggregation endpoint and its admin endpoints
    Aggregator(AggregatorArgs),
}

#[derive(Args)]
struct AggregatorArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("aggregator error: {0}")]
    Aggregator(#[from] AggregatorError),
}

fn main() {
    let cli = CliCommand::parse();

    let result = match cli {
        CliCommand::Aggregator(args) => run_aggregator(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_aggregator(args: AggregatorArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config_file_path)?;

    let _sentry_guard = telemetry::init_logging(config.common.logging.as_ref())?;
    telemetry::init_metrics(config.common.metrics.as_ref())?;

    let api_key = ApiKey::resolve(
        config.aggregator.api_key.clone(),
        std::env::var(API_KEY_ENV_VAR).ok(),
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tracing::info!("Starting aggregator");
    rt.block_on(aggregator::run(config.aggregator, api_key))?;
    Ok(())
}
