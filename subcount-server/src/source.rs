//! Metric source adapter
//!
//! A [`MetricSource`] returns one integer on demand for the signed-in account,
//! or a classified [`FetchError`]. The production source reads the exact
//! subscriber count of the authenticated YouTube channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::auth::CredentialProvider;
use crate::error::FetchError;

/// Something that can produce the current value of the tracked metric
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Fetch the current value for the authenticated principal
    async fn fetch_current_value(&self) -> Result<u64, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    statistics: ChannelStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    #[serde(default)]
    subscriber_count: Option<String>,
}

/// Exact subscriber count of the signed-in user's own channel
pub struct YouTubeSubscriberSource {
    credentials: Arc<CredentialProvider>,
    http: reqwest::Client,
    /// e.g. `https://www.googleapis.com/youtube/v3`
    api_base_url: String,
}

impl YouTubeSubscriberSource {
    pub fn new(
        credentials: Arc<CredentialProvider>,
        http: reqwest::Client,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            http,
            api_base_url: api_base_url.into(),
        }
    }
}

#[async_trait]
impl MetricSource for YouTubeSubscriberSource {
    async fn fetch_current_value(&self) -> Result<u64, FetchError> {
        let token = self.credentials.access_token().await?;

        let resp = self
            .http
            .get(format!("{}/channels", self.api_base_url))
            .query(&[("part", "statistics"), ("mine", "true")])
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_api_failure(status.as_u16(), &body));
        }

        let data: ChannelListResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("unreadable channel list: {}", e)))?;

        let raw = data
            .items
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NoData("no channel for the authenticated account".to_string()))?
            .statistics
            .subscriber_count
            .ok_or_else(|| FetchError::NoData("channel statistics omit the subscriber count".to_string()))?;

        debug!("Channel statistics returned subscriberCount={}", raw);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| FetchError::Transient(format!("invalid subscriber count {:?}: {}", raw, e)))
    }
}

/// Map an API error response to a fetch error class
fn classify_api_failure(status: u16, body: &str) -> FetchError {
    let credential_problem = status == 401
        || body.contains("invalid_grant")
        || body.contains("invalid_token")
        || body.contains("authError");

    if credential_problem {
        FetchError::CredentialExpired(format!("HTTP {}: {}", status, body))
    } else {
        FetchError::Transient(format!("HTTP {}: {}", status, body))
    }
}
