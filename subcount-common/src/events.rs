//! Realtime event types exchanged with connected viewers
//!
//! Every frame is a JSON object of the form `{"event": <name>, "data": <payload>}`.
//!
//! Server → client:
//! - `client-count` (integer)
//! - `subscriber-update` (Snapshot)
//! - `error` (`{"message": string}`)
//!
//! Client → server:
//! - `request-update` (no payload)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time;

/// Notice sent to a viewer connecting while the server is not signed in
pub const NOT_AUTHENTICATED_MESSAGE: &str = "Server not authenticated. Admin needs to sign in";

/// Notice broadcast when the stored credential stops working
pub const AUTH_EXPIRED_MESSAGE: &str = "Authentication expired. Please re-authenticate the server.";

/// Notice broadcast when a poll fails for any other reason
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch subscriber count";

/// Full state bundle pushed to viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Exact current count
    pub count: u64,
    pub goal: u64,
    pub previous_goal: u64,
    pub timestamp: DateTime<Utc>,
    /// Always true: counts come from the authenticated API, not the rounded public one
    pub exact: bool,
}

impl Snapshot {
    /// Build a snapshot stamped with the current time
    pub fn now(count: u64, goal: u64, previous_goal: u64) -> Self {
        Self {
            count,
            goal,
            previous_goal,
            timestamp: time::now(),
            exact: true,
        }
    }
}

/// Payload of an `error` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

/// Events pushed from the server to viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Number of currently connected viewers
    ClientCount(usize),

    /// Current count and goal state
    SubscriberUpdate(Snapshot),

    /// Something went wrong; viewers should display the message
    Error(ErrorNotice),
}

impl ServerEvent {
    /// Create an `error` event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorNotice {
            message: message.into(),
        })
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ClientCount(_) => "client-count",
            ServerEvent::SubscriberUpdate(_) => "subscriber-update",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Events sent by viewers to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Ask for an immediate poll
    RequestUpdate,
}

impl ClientEvent {
    /// Parse an incoming text frame
    ///
    /// Accepts the JSON form and the bare event name. Returns `None` for
    /// anything unrecognised.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == "request-update" {
            return Some(Self::RequestUpdate);
        }
        serde_json::from_str(text).ok()
    }
}
