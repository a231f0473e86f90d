//! Poll scheduler
//!
//! Fetches the metric on a fixed interval, on viewer `request-update` events
//! and right after sign-in. Each trigger performs at most one fetch, and only
//! while authenticated.
//!
//! Polls are not serialized against each other: two overlapping polls both
//! fetch, and whichever result lands last wins. Results are fenced by the
//! session generation, so a fetch that started before a logout (or before a
//! credential failure demoted the session) is dropped instead of applied.
//!
//! All fetch errors end here. Credential failures demote the session and
//! notify viewers; anything else only notifies viewers. Nothing is retried
//! early: the next trigger is the retry.

use std::sync::Arc;
use std::time::Duration;

use subcount_common::events::Snapshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::source::MetricSource;
use crate::state::{ApplyOutcome, SharedState};

/// What caused a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTrigger {
    Timer,
    ClientRequest,
    SignIn,
}

/// What a poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not authenticated; nothing fetched
    Skipped,
    /// Session updated and snapshot broadcast
    Updated(Snapshot),
    /// Authentication changed during the fetch; result dropped
    Discarded,
    /// Source had nothing to report; nothing broadcast
    NoData,
    /// Session demoted and viewers told to re-authenticate
    CredentialExpired,
    /// Viewers told the fetch failed
    TransientFailure,
}

/// Drives the metric source and feeds results into the shared state
pub struct Poller {
    state: Arc<SharedState>,
    source: Arc<dyn MetricSource>,
}

impl Poller {
    pub fn new(state: Arc<SharedState>, source: Arc<dyn MetricSource>) -> Self {
        Self { state, source }
    }

    /// Run one poll to completion
    pub async fn poll_once(&self, trigger: PollTrigger) -> PollOutcome {
        let Some(ticket) = self.state.begin_poll().await else {
            debug!("Poll ({:?}) skipped: not authenticated", trigger);
            return PollOutcome::Skipped;
        };

        match self.source.fetch_current_value().await {
            Ok(value) => match self.state.apply_value(ticket, value).await {
                ApplyOutcome::Applied { snapshot, advance } => {
                    if let Some(advance) = advance {
                        info!("Goal {} reached, next goal {}", advance.reached, advance.next);
                    }
                    info!("Exact count: {} | Goal: {}", snapshot.count, snapshot.goal);
                    PollOutcome::Updated(snapshot)
                }
                ApplyOutcome::Stale => {
                    debug!("Poll ({:?}) result discarded: session changed during fetch", trigger);
                    PollOutcome::Discarded
                }
                ApplyOutcome::Rejected(reason) => {
                    error!("Error fetching subscriber count: {}", reason);
                    PollOutcome::TransientFailure
                }
            },
            Err(FetchError::NoData(reason)) => {
                warn!("Poll ({:?}) returned no data: {}", trigger, reason);
                PollOutcome::NoData
            }
            Err(FetchError::CredentialExpired(reason)) => {
                error!("Error fetching subscriber count: {}", reason);
                if self.state.expire_credentials(ticket).await {
                    warn!("Token expired. Please re-authenticate.");
                    PollOutcome::CredentialExpired
                } else {
                    PollOutcome::Discarded
                }
            }
            Err(FetchError::Transient(reason)) => {
                error!("Error fetching subscriber count: {}", reason);
                if self.state.report_fetch_failure(ticket).await {
                    PollOutcome::TransientFailure
                } else {
                    PollOutcome::Discarded
                }
            }
        }
    }

    /// Start a poll in the background
    pub fn request(self: &Arc<Self>, trigger: PollTrigger) -> JoinHandle<PollOutcome> {
        let poller = Arc::clone(self);
        tokio::spawn(async move { poller.poll_once(trigger).await })
    }

    /// Start the periodic timer
    ///
    /// The first poll fires one full interval after start; sign-in triggers
    /// its own immediate poll.
    pub fn start(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!("Poll scheduler started (interval {}s)", interval.as_secs_f64());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.request(PollTrigger::Timer);
            }
        })
    }
}
