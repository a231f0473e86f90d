//! # Subcount Server Library (subcount-server)
//!
//! Polls the exact subscriber count of a signed-in YouTube channel, tracks a
//! round-number goal, and pushes updates to connected overlay viewers over a
//! WebSocket.
//!
//! **Architecture:** one lock-guarded session record plus viewer registry
//! ([`state::SharedState`]), a poll scheduler ([`poller::Poller`]) feeding it
//! from a [`source::MetricSource`], and an axum router ([`api`]).

pub mod api;
pub mod auth;
pub mod error;
pub mod hub;
pub mod poller;
pub mod server;
pub mod source;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
