//! Shared session state
//!
//! The session record and the viewer registry are the only mutable state in
//! the service. Both sit behind one async mutex so that every mutation and the
//! broadcast that follows it happen as one unit: no viewer can observe a
//! half-updated session, and a state change is always queued to viewers
//! before the lock is released.
//!
//! Authentication transitions bump a generation counter. A poll records the
//! generation when it starts and its result is discarded if the generation
//! moved while the fetch was in flight (for example after a logout).

use subcount_common::events::{ServerEvent, Snapshot, AUTH_EXPIRED_MESSAGE, FETCH_FAILED_MESSAGE};
use subcount_common::{GoalAdvance, GoalTracker};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::hub::{BroadcastHub, ClientId, DEFAULT_SEND_QUEUE};

/// Process-wide session record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Last observed exact count
    pub current_value: u64,
    /// Goal and previous goal
    pub goal: GoalTracker,
    pub authenticated: bool,
}

impl SessionState {
    pub fn new(goal: GoalTracker) -> Self {
        Self {
            current_value: 0,
            goal,
            authenticated: false,
        }
    }

    /// Snapshot of the current values stamped with the current time
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::now(
            self.current_value,
            self.goal.goal(),
            self.goal.previous_goal(),
        )
    }
}

/// Proof that a poll was started while authenticated, tagged with the generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    generation: u64,
}

/// Result of applying a fetched value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Session updated and snapshot broadcast
    Applied {
        snapshot: Snapshot,
        advance: Option<GoalAdvance>,
    },
    /// Authentication changed since the fetch started; nothing was touched
    Stale,
    /// Value cannot be tracked; session untouched and viewers told the fetch failed
    Rejected(String),
}

struct Inner {
    session: SessionState,
    generation: u64,
    hub: BroadcastHub,
}

impl Inner {
    fn is_current(&self, ticket: PollTicket) -> bool {
        self.session.authenticated && ticket.generation == self.generation
    }
}

/// Session state and viewer registry guarded by one lock
pub struct SharedState {
    inner: Mutex<Inner>,
    /// Sent to viewers that connect while the server is signed out
    not_authenticated_message: String,
}

impl SharedState {
    /// Create shared state with the initial goal and default viewer queue size
    pub fn new(goal: GoalTracker, not_authenticated_message: impl Into<String>) -> Self {
        Self::with_send_queue(goal, not_authenticated_message, DEFAULT_SEND_QUEUE)
    }

    pub fn with_send_queue(
        goal: GoalTracker,
        not_authenticated_message: impl Into<String>,
        send_queue: usize,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                session: SessionState::new(goal),
                generation: 0,
                hub: BroadcastHub::new(send_queue),
            }),
            not_authenticated_message: not_authenticated_message.into(),
        }
    }

    /// Register a viewer
    ///
    /// Every viewer (including the new one) receives the new count. The new
    /// viewer alone then receives the current snapshot, or a not-authenticated
    /// notice when signed out.
    pub async fn connect(&self) -> (ClientId, mpsc::Receiver<ServerEvent>) {
        let mut inner = self.inner.lock().await;
        let (id, rx) = inner.hub.register();
        info!("Client connected: {} (Total: {})", id, inner.hub.client_count());

        inner.hub.broadcast_client_count();

        let greeting = if inner.session.authenticated {
            ServerEvent::SubscriberUpdate(inner.session.snapshot())
        } else {
            ServerEvent::error(self.not_authenticated_message.as_str())
        };
        inner.hub.send_to(&id, greeting);

        (id, rx)
    }

    /// Remove a viewer and tell the rest the new count
    pub async fn disconnect(&self, id: &ClientId) {
        let mut inner = self.inner.lock().await;
        if inner.hub.unregister(id) {
            info!("Client disconnected: {} (Total: {})", id, inner.hub.client_count());
            inner.hub.broadcast_client_count();
        }
    }

    /// Mark the session authenticated
    pub async fn sign_in(&self) {
        let mut inner = self.inner.lock().await;
        inner.session.authenticated = true;
        inner.generation += 1;
        debug!("Session authenticated (generation {})", inner.generation);
    }

    /// Mark the session unauthenticated. Returns true if it was authenticated.
    pub async fn sign_out(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let was_authenticated = inner.session.authenticated;
        inner.session.authenticated = false;
        inner.generation += 1;
        debug!("Session signed out (generation {})", inner.generation);
        was_authenticated
    }

    /// Start a poll. Returns None when not authenticated.
    pub async fn begin_poll(&self) -> Option<PollTicket> {
        let inner = self.inner.lock().await;
        inner.session.authenticated.then_some(PollTicket {
            generation: inner.generation,
        })
    }

    /// Apply a fetched value and broadcast the resulting snapshot
    pub async fn apply_value(&self, ticket: PollTicket, value: u64) -> ApplyOutcome {
        let mut inner = self.inner.lock().await;
        if !inner.is_current(ticket) {
            return ApplyOutcome::Stale;
        }

        let advance = match inner.session.goal.observe(value) {
            Ok(advance) => advance,
            Err(e) => {
                inner.hub.broadcast_error(FETCH_FAILED_MESSAGE);
                return ApplyOutcome::Rejected(e.to_string());
            }
        };
        inner.session.current_value = value;

        let snapshot = inner.session.snapshot();
        inner.hub.broadcast_snapshot(snapshot.clone());

        ApplyOutcome::Applied { snapshot, advance }
    }

    /// Demote to unauthenticated after a credential failure and notify every viewer
    ///
    /// Returns false (and changes nothing) if the ticket is stale.
    pub async fn expire_credentials(&self, ticket: PollTicket) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.is_current(ticket) {
            return false;
        }

        inner.session.authenticated = false;
        inner.generation += 1;
        inner.hub.broadcast_error(AUTH_EXPIRED_MESSAGE);
        true
    }

    /// Notify every viewer of a transient fetch failure
    ///
    /// Returns false (and sends nothing) if the ticket is stale.
    pub async fn report_fetch_failure(&self, ticket: PollTicket) -> bool {
        let inner = self.inner.lock().await;
        if !inner.is_current(ticket) {
            return false;
        }

        inner.hub.broadcast_error(FETCH_FAILED_MESSAGE);
        true
    }

    /// Copy of the current session record
    pub async fn session(&self) -> SessionState {
        self.inner.lock().await.session.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.lock().await.session.authenticated
    }

    pub async fn client_count(&self) -> usize {
        self.inner.lock().await.hub.client_count()
    }
}
