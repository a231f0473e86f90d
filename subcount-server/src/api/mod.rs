//! HTTP and realtime API
//!
//! Control surface:
//! - `GET /` status page
//! - `GET /auth` start sign-in with the identity provider
//! - `GET /oauth2callback` finish sign-in
//! - `GET /logout` sign out
//!
//! Observability:
//! - `GET /health`
//! - `GET /status` (JSON)
//!
//! Realtime:
//! - `GET /ws` WebSocket channel for viewers

pub mod health;
pub mod oauth;
pub mod status;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::CredentialProvider;
use crate::poller::Poller;
use crate::state::SharedState;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session record and viewer registry
    pub state: Arc<SharedState>,
    /// Poll scheduler, for sign-in and viewer-requested polls
    pub poller: Arc<Poller>,
    /// OAuth credentials for the signed-in account
    pub credentials: Arc<CredentialProvider>,
    /// Shown on the sign-in page
    pub poll_interval: Duration,
    /// Held while installing or dropping credentials together with the
    /// matching session change
    pub auth_transition: Arc<Mutex<()>>,
}

/// Build the application router
pub fn build_router(app: AppState) -> Router {
    Router::new()
        .route("/", get(status::status_page))
        .route("/status", get(status::status_json))
        .route("/auth", get(oauth::begin_sign_in))
        .route("/oauth2callback", get(oauth::oauth_callback))
        .route("/logout", get(oauth::logout))
        .route("/ws", get(ws::ws_handler))
        .merge(health::health_routes())
        .with_state(app)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
