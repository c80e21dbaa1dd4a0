pub mod branch;
pub mod config;
pub mod errors;
pub mod executor;
pub mod handler;
pub mod http;
pub mod metrics_defs;
pub mod protocol;
pub mod service;

#[cfg(test)]
mod testutils;

use config::{ApiKey, Config};
use errors::AggregatorError;
use handler::AggregateHandler;
use service::AggregatorService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Serves the aggregation endpoint and the admin endpoints until either listener fails.
///
/// `config` is expected to be validated already. The credential is resolved by
/// the caller so that the handler never reads process state.
pub async fn run(config: Config, api_key: Option<ApiKey>) -> Result<(), AggregatorError> {
    if api_key.is_none() {
        tracing::warn!("No NASA API key configured, aggregation requests will fail");
    }

    let handler = Arc::new(AggregateHandler::from_config(&config, api_key));
    let aggregator_service = AggregatorService::new(handler.clone());
    let admin_service = AdminService::<_, AggregatorError>::new(move || handler.is_ready());

    let aggregator_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        aggregator_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(aggregator_task, admin_task)?;
    Ok(())
}
