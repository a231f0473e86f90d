//! OAuth credential provider
//!
//! Owns the OAuth client settings and the tokens obtained from the identity
//! provider. Lifecycle:
//! - acquire: [`CredentialProvider::authorization_url`], then
//!   [`CredentialProvider::exchange_code`] with the callback code and
//!   [`CredentialProvider::set_tokens`] with the result
//! - refresh: transparent, inside [`CredentialProvider::access_token`]
//! - revoke: [`CredentialProvider::revoke`] drops the tokens
//!
//! No lock on the tokens is held across a request to the identity provider,
//! so a revoke never waits on a slow token endpoint.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use subcount_common::config::OAuthSettings;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{AuthError, FetchError};

/// Tokens are treated as expired this long before the provider says so
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Upper bound on outstanding sign-in attempts
const MAX_PENDING_STATES: usize = 32;

/// Tokens held for the signed-in account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// None when the provider gave no lifetime
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|at| now + Duration::seconds(EXPIRY_BUFFER_SECS) >= at)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_tokens(self, previous_refresh: Option<String>) -> OAuthTokens {
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Credential provider injected into the metric source and the HTTP handlers
pub struct CredentialProvider {
    settings: OAuthSettings,
    http: reqwest::Client,
    tokens: RwLock<Option<OAuthTokens>>,
    /// Serializes refreshes
    refresh_lock: Mutex<()>,
    pending_states: Mutex<HashSet<String>>,
}

impl CredentialProvider {
    pub fn new(settings: OAuthSettings, http: reqwest::Client) -> Self {
        Self {
            settings,
            http,
            tokens: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            pending_states: Mutex::new(HashSet::new()),
        }
    }

    /// Build the provider consent URL and remember its `state` token
    pub async fn authorization_url(&self) -> Result<String, AuthError> {
        if !self.settings.is_configured() {
            return Err(AuthError::NotConfigured);
        }

        let state = Uuid::new_v4().simple().to_string();
        let scope = self.settings.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state.as_str()),
            ],
        )?;

        let mut pending = self.pending_states.lock().await;
        if pending.len() >= MAX_PENDING_STATES {
            warn!("Too many pending sign-in attempts, discarding older ones");
            pending.clear();
        }
        pending.insert(state);

        Ok(url.into())
    }

    /// Exchange the callback code for tokens
    ///
    /// The tokens are returned, not stored; the caller installs them with
    /// [`CredentialProvider::set_tokens`] together with the session change.
    pub async fn exchange_code(&self, code: &str, state: Option<&str>) -> Result<OAuthTokens, AuthError> {
        let known_state = match state {
            Some(state) => self.pending_states.lock().await.remove(state),
            None => false,
        };
        if !known_state {
            return Err(AuthError::StateMismatch);
        }
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];
        if let Some(secret) = self.settings.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .http
            .post(&self.settings.token_url)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let data: TokenResponse = resp.json().await?;
        if data.refresh_token.is_none() {
            warn!("Identity provider returned no refresh token; re-authentication will be needed when the access token expires");
        }
        info!("✓ OAuth tokens acquired");
        Ok(data.into_tokens(None))
    }

    /// Current access token, refreshed first if it has expired
    pub async fn access_token(&self) -> Result<String, FetchError> {
        if let Some(token) = self.unexpired_access_token().await? {
            return Ok(token);
        }

        let _refreshing = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(token) = self.unexpired_access_token().await? {
            return Ok(token);
        }

        let current = self.tokens.read().await.clone().ok_or_else(no_credentials)?;
        let refresh_token = current.refresh_token.clone().ok_or_else(|| {
            FetchError::CredentialExpired("access token expired and no refresh token held".to_string())
        })?;

        let refreshed = self.refresh(&refresh_token).await?;

        let mut tokens = self.tokens.write().await;
        if tokens.as_ref() == Some(&current) {
            let access = refreshed.access_token.clone();
            *tokens = Some(refreshed);
            return Ok(access);
        }
        match tokens.as_ref() {
            // Signed in again while the refresh was in flight
            Some(held) => Ok(held.access_token.clone()),
            None => Err(FetchError::CredentialExpired(
                "credentials revoked during refresh".to_string(),
            )),
        }
    }

    /// Held access token if it has not expired, None if it needs a refresh
    async fn unexpired_access_token(&self) -> Result<Option<String>, FetchError> {
        let tokens = self.tokens.read().await;
        let held = tokens.as_ref().ok_or_else(no_credentials)?;
        Ok((!held.is_expired(Utc::now())).then(|| held.access_token.clone()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens, FetchError> {
        debug!("Refreshing OAuth access token");

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.settings.client_id.as_str()),
        ];
        if let Some(secret) = self.settings.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .http
            .post(&self.settings.token_url)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_refresh_failure(status.as_u16(), &body));
        }

        let data: TokenResponse = resp.json().await?;
        info!("✓ OAuth access token refreshed");
        Ok(data.into_tokens(Some(refresh_token.to_string())))
    }

    /// Drop all held tokens
    pub async fn revoke(&self) {
        if self.tokens.write().await.take().is_some() {
            info!("OAuth tokens revoked");
        }
    }

    pub async fn has_credentials(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Install tokens directly
    pub async fn set_tokens(&self, tokens: OAuthTokens) {
        *self.tokens.write().await = Some(tokens);
    }
}

fn no_credentials() -> FetchError {
    FetchError::CredentialExpired("no credentials held".to_string())
}

/// Token endpoint failures mentioning a dead grant mean the user must sign in again
fn classify_refresh_failure(status: u16, body: &str) -> FetchError {
    if body.contains("invalid_grant") || body.contains("invalid_token") || status == 401 {
        FetchError::CredentialExpired(format!("refresh rejected (HTTP {}): {}", status, body))
    } else {
        FetchError::Transient(format!("refresh failed (HTTP {}): {}", status, body))
    }
}
