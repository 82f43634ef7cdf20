use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use connectivity_reconciler::clients::broker::BrokerProbeClient;
use connectivity_reconciler::clients::catalog::CatalogClient;
use connectivity_reconciler::clients::eventlog::HttpEventLog;
use connectivity_reconciler::clients::state::ConnectivityStateClient;
use connectivity_reconciler::config::Config;
use connectivity_reconciler::health::HealthChecker;
use connectivity_reconciler::hub_relevance::{HubRelevanceFilter, Strategy};
use connectivity_reconciler::token::TokenSource;
use connectivity_reconciler::topic_generator::GeneratorFactory;
use connectivity_reconciler::{assignment, health, sweep};

/// Periodic MQTT connectivity reconciler.
#[derive(Parser, Debug)]
#[command(name = "connectivity-reconciler", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connectivity_reconciler=info".into()),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "starting connectivity reconciler");

    let config = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %cli.config, error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    // Give downstream services (catalog, broker, state store) a moment to
    // come up when this process is started alongside them (spec §5).
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    let assignment_index =
        assignment::parse_assignment_index(&config.assignment_id).context("parsing assignment_id")?;
    let topic_generator = GeneratorFactory::resolve(&config.topic_generator).context("resolving topic_generator")?;
    let handled_protocols = config.handled_protocols();

    let tokens = Arc::new(TokenSource::new(
        config.auth_endpoint.clone(),
        config.auth_client_id.clone(),
        config.auth_client_secret.clone(),
    ));
    let catalog: Arc<dyn connectivity_reconciler::clients::Catalog> = Arc::new(CatalogClient::new(
        config.device_manager_url.clone(),
        config.perm_search_url.clone(),
    ));
    let broker: Arc<dyn connectivity_reconciler::clients::BrokerProbe> =
        Arc::new(BrokerProbeClient::new(config.vernemq_management_url.clone()));
    let state: Arc<dyn connectivity_reconciler::clients::ConnectivityState> =
        Arc::new(ConnectivityStateClient::new(config.connection_log_state_url.clone()));
    let event_log: Arc<dyn connectivity_reconciler::clients::EventLog> = Arc::new(HttpEventLog::new(
        config.zookeeper_url.clone(),
        config.device_log_topic.clone(),
        config.hub_log_topic.clone(),
    ));

    let hub_relevance = HubRelevanceFilter::new(catalog.clone(), handled_protocols.clone(), Strategy::Local);

    let engine = Arc::new(sweep::SweepEngine::new(
        catalog,
        broker,
        state,
        event_log,
        tokens,
        hub_relevance,
        topic_generator,
        handled_protocols,
        config.batch_size,
        config.batch_sleep_duration(),
        assignment_index,
        config.scaling_count(),
        config.debug,
    ));

    let health_checker = Arc::new(HealthChecker::new(config.expected_health_interval(), config.health_error_limit));
    let cancel = CancellationToken::new();

    let sweep_handle = engine.run_interval(cancel.clone(), config.sweep_interval(), health_checker.clone());
    let health_handle = health::start_endpoint(config.health_port, health_checker, cancel.clone());

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, cancelling background tasks");
    cancel.cancel();

    let _ = tokio::join!(sweep_handle, health_handle);
    info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
