//! Service wiring and HTTP server lifecycle

use std::sync::Arc;

use subcount_common::config::ServiceConfig;
use subcount_common::events::NOT_AUTHENTICATED_MESSAGE;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::api::{build_router, AppState};
use crate::auth::CredentialProvider;
use crate::error::{Error, Result};
use crate::poller::Poller;
use crate::source::YouTubeSubscriberSource;
use crate::state::SharedState;

/// Build the shared state, credential provider, metric source and poller
pub fn build_app_state(config: &ServiceConfig) -> Result<AppState> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("subcount-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;

    let state = Arc::new(SharedState::new(
        config.goal,
        format!("{} at {}", NOT_AUTHENTICATED_MESSAGE, config.public_url()),
    ));
    let credentials = Arc::new(CredentialProvider::new(config.oauth.clone(), http.clone()));
    let source = Arc::new(YouTubeSubscriberSource::new(
        Arc::clone(&credentials),
        http,
        config.api_base_url.clone(),
    ));
    let poller = Arc::new(Poller::new(Arc::clone(&state), source));

    Ok(AppState {
        state,
        poller,
        credentials,
        poll_interval: config.poll_interval,
        auth_transition: Arc::new(Mutex::new(())),
    })
}

/// Run the service until Ctrl+C / SIGTERM
pub async fn run(config: ServiceConfig) -> Result<()> {
    if !config.oauth.is_configured() {
        warn!("No OAuth client id configured; sign-in is disabled until one is set");
    }

    let app = build_app_state(&config)?;
    let timer = Arc::clone(&app.poller).start(config.poll_interval);
    let router = build_router(app);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Server running on: {}", config.public_url());
    info!("Sign in at: {}", config.public_url());
    info!("Realtime channel: {}/ws", config.public_url().replacen("http", "ws", 1));
    info!("Update interval: {} seconds", config.poll_interval.as_secs());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    timer.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
