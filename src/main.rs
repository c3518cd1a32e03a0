use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wiser_hub_service::{
    api::{self, AppState},
    config::Config,
    control::{CommandDispatcher, CommandSettings},
    coordinator::RefreshCoordinator,
    host::{self, EntityRegistry, StandaloneHost},
    hub::WiserClient,
    notify::LogNotifier,
    setup::StartupSequencer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!(
        host = %config.host,
        authenticated = config.secret.is_some(),
        scan_interval_secs = config.scan_interval().as_secs(),
        "Wiser hub service starting"
    );

    let client = WiserClient::new(&config)?;
    let notifier = Arc::new(LogNotifier::new());
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::new(client),
        notifier.clone(),
        config.scan_interval(),
    ));
    let dispatcher = CommandDispatcher::new(coordinator, CommandSettings::from(&config));

    let registry = EntityRegistry::new();
    let standalone = Arc::new(StandaloneHost::new(registry.clone()));
    let cancel = CancellationToken::new();

    // Connect in the background; the API is up while the hub is unreachable.
    let sequencer = StartupSequencer::new(dispatcher.clone(), standalone, config.setup_retry_delay());
    let setup = sequencer.start(cancel.child_token());

    let poller = tokio::spawn(host::poll_loop(
        registry.clone(),
        config.scan_interval(),
        cancel.child_token(),
    ));

    let state = AppState {
        registry,
        dispatcher,
        notifier,
        setup: setup.subscribe(),
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    let final_state = setup.join().await;
    if let Err(e) = poller.await {
        error!(error = %e, "Poll loop task failed");
    }
    info!(setup = ?final_state, "Wiser hub service stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
