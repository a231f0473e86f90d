//! Sign-in / sign-out handlers
//!
//! Sign-in failures are answered on the request that started them and never
//! reach connected viewers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info};

use super::AppState;
use crate::error::AuthError;
use crate::poller::PollTrigger;

const AUTH_FAILED_PAGE: &str = "Authentication failed. Please try again.";

/// Query parameters of the provider redirect
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declined consent
    pub error: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::NotConfigured | AuthError::InvalidUrl(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::MissingCode | AuthError::StateMismatch => StatusCode::BAD_REQUEST,
            AuthError::Rejected { .. } | AuthError::Network(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Html(AUTH_FAILED_PAGE)).into_response()
    }
}

/// GET /auth - redirect to the provider consent screen
pub async fn begin_sign_in(State(app): State<AppState>) -> Response {
    match app.credentials.authorization_url().await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            error!("Cannot start authentication: {}", e);
            e.into_response()
        }
    }
}

/// GET /oauth2callback - finish sign-in and start polling
pub async fn oauth_callback(
    State(app): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(reason) = params.error {
        error!("Authentication declined by provider: {}", reason);
        return (StatusCode::UNAUTHORIZED, Html(AUTH_FAILED_PAGE)).into_response();
    }

    let code = params.code.unwrap_or_default();
    let tokens = match app
        .credentials
        .exchange_code(&code, params.state.as_deref())
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            error!("Authentication error: {}", e);
            return e.into_response();
        }
    };

    {
        let _transition = app.auth_transition.lock().await;
        app.credentials.set_tokens(tokens).await;
        app.state.sign_in().await;
    }
    info!("✓ Authentication successful");
    app.poller.request(PollTrigger::SignIn);
    Redirect::to("/").into_response()
}

/// GET /logout - forget credentials and stop polling
pub async fn logout(State(app): State<AppState>) -> Redirect {
    let _transition = app.auth_transition.lock().await;
    app.credentials.revoke().await;
    if app.state.sign_out().await {
        info!("Signed out");
    }
    Redirect::to("/")
}
