//! Error types for subcount-server
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for subcount-server
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP client or listener setup errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Socket I/O while serving
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using subcount-server Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the sign-in flow
///
/// These are reported to the request that started the exchange only.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No OAuth client id configured
    #[error("OAuth client is not configured")]
    NotConfigured,

    /// Callback arrived without an authorization code
    #[error("Missing authorization code")]
    MissingCode,

    /// Callback `state` did not match a pending sign-in
    #[error("State token mismatch")]
    StateMismatch,

    /// Identity provider rejected the request
    #[error("OAuth error (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Configured authorization endpoint is not a valid URL
    #[error("Invalid authorization URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network failure talking to the identity provider
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Classified failures of the metric source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Credential missing, expired or revoked. Requires signing in again.
    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    /// Anything else; the next poll retries
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// Request succeeded but returned no value for the principal
    #[error("No data: {0}")]
    NoData(String),
}

impl FetchError {
    /// True when the failure should demote the session to unauthenticated
    pub fn is_credential_error(&self) -> bool {
        matches!(self, FetchError::CredentialExpired(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transient(e.to_string())
    }
}
