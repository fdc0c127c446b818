//! Registry mediator binary.
//!
//! Loads the configuration (properties file named by `MEDIATOR_PROPERTIES`,
//! then environment overrides), wires the reference collaborators and
//! serves the registry route until Ctrl-C.

use anyhow::Context;
use registry_mediator::adapters::{
    HttpForwarder, SlotPatientIdEnricher, SlotPatientIdParser, StaticCrossReference,
};
use registry_mediator::server::{self, AppState};
use registry_mediator::{MediatorConfig, RegistryEnvironment, RegistryQueryDispatcher};
use registry_mediator_core::environment::SystemClock;
use registry_mediator_runtime::metrics::MetricsServer;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "registry_mediator=info,registry_mediator_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Arc::new(MediatorConfig::load().context("invalid mediator configuration")?);

    let mut metrics = MetricsServer::new();
    metrics.start().context("failed to install metrics recorder")?;
    registry_mediator::metrics::describe_metrics();

    let cross_reference = match &config.xref_file {
        Some(path) => StaticCrossReference::load(path).context("failed to load cross-reference table")?,
        None => {
            tracing::warn!("No pix.xref.file configured; every patient will be unknown");
            StaticCrossReference::new()
        },
    };

    let env = RegistryEnvironment::new(
        Arc::clone(&config),
        Arc::new(SystemClock),
        Arc::new(SlotPatientIdParser::new().context("failed to compile stored query parser")?),
        Arc::new(cross_reference),
        Arc::new(SlotPatientIdEnricher::new().context("failed to compile stored query enricher")?),
        Arc::new(HttpForwarder::new(config.request_timeout).context("failed to build registry client")?),
    );

    let state = AppState {
        dispatcher: RegistryQueryDispatcher::new(env),
        metrics: Arc::new(metrics),
    };

    server::serve(&config, state).await.context("server error")?;

    tracing::info!("Registry mediator stopped");
    Ok(())
}
