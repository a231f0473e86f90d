//! # Subcount Common Library
//!
//! Shared code for the subscriber count relay including:
//! - Goal tracking policy (GoalTracker)
//! - Realtime event types (ServerEvent, ClientEvent)
//! - Configuration loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod goal;
pub mod time;

pub use error::{Error, Result};
pub use goal::{GoalAdvance, GoalTracker};
