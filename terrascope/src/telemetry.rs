use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "terrascope";

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid sentry DSN: {0}")]
    InvalidDsn(#[from] sentry::types::ParseDsnError),
    #[error("failed to initialize tracing subscriber: {0}")]
    Tracing(String),
    #[error("failed to initialize statsd exporter: {0}")]
    Metrics(String),
}

/// Installs the global tracing subscriber, forwarding events to Sentry when a DSN is configured.
///
/// The filter defaults to `info` and can be overridden with `RUST_LOG`. The
/// returned guard must be held for as long as events should reach Sentry.
pub fn init_logging(
    logging: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, TelemetryError> {
    let sentry_guard = match logging {
        Some(config) => {
            let dsn: sentry::types::Dsn = config.sentry_dsn.parse()?;
            Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            }))
        }
        None => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = sentry_guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .try_init()
        .map_err(|e| TelemetryError::Tracing(e.to_string()))?;

    Ok(sentry_guard)
}

/// Installs the StatsD recorder, if configured, and describes every aggregator metric.
///
/// Without a metrics section the `metrics` facade stays a no-op.
pub fn init_metrics(metrics: Option<&MetricsConfig>) -> Result<(), TelemetryError> {
    let Some(config) = metrics else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

    shared::describe_metrics!(aggregator::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Sending metrics to statsd"
    );

    Ok(())
}
