//! Broadcast hub for connected viewers
//!
//! Holds one bounded outbound queue per connected viewer. Delivery is
//! at-most-once and best-effort: a full or closed queue drops the event and
//! nobody is told. A viewer that misses an update catches up on the next poll.
//!
//! The hub itself is not synchronized; it lives inside [`crate::state::SharedState`]
//! next to the session record so that both change under the same lock.

use std::collections::HashMap;
use std::fmt;

use subcount_common::events::{Snapshot, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outbound queue length per viewer
pub const DEFAULT_SEND_QUEUE: usize = 64;

/// Handle for one open viewer connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client_{}", self.0.simple())
    }
}

/// Registry of connected viewers and their outbound queues
pub struct BroadcastHub {
    clients: HashMap<ClientId, mpsc::Sender<ServerEvent>>,
    send_queue: usize,
}

impl BroadcastHub {
    pub fn new(send_queue: usize) -> Self {
        Self {
            clients: HashMap::new(),
            send_queue: send_queue.max(1),
        }
    }

    /// Add a viewer; returns its id and the receiving end of its queue
    pub fn register(&mut self) -> (ClientId, mpsc::Receiver<ServerEvent>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.send_queue);
        self.clients.insert(id, tx);
        (id, rx)
    }

    /// Remove a viewer. Returns false if it was not registered.
    pub fn unregister(&mut self, id: &ClientId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Queue an event for one viewer
    pub fn send_to(&self, id: &ClientId, event: ServerEvent) -> bool {
        match self.clients.get(id) {
            Some(tx) => Self::try_deliver(id, tx, event),
            None => false,
        }
    }

    /// Queue an event for every viewer; returns how many queues accepted it
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let delivered = self
            .clients
            .iter()
            .filter(|(id, tx)| Self::try_deliver(id, tx, event.clone()))
            .count();
        debug!(
            "Broadcast {} to {}/{} clients",
            event.name(),
            delivered,
            self.clients.len()
        );
        delivered
    }

    /// Tell every viewer how many viewers are connected
    pub fn broadcast_client_count(&self) -> usize {
        self.broadcast(ServerEvent::ClientCount(self.client_count()))
    }

    pub fn broadcast_snapshot(&self, snapshot: Snapshot) -> usize {
        self.broadcast(ServerEvent::SubscriberUpdate(snapshot))
    }

    pub fn broadcast_error(&self, message: &str) -> usize {
        self.broadcast(ServerEvent::error(message))
    }

    fn try_deliver(id: &ClientId, tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Send queue full for {}, dropping {}", id, event.name());
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_QUEUE)
    }
}
