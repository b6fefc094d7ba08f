//! Draft Room - matchmaking for captain-drafted team matches
//!
//! This crate runs 5v5 and 2v2 queues, captain draft and map ban sessions,
//! fixed-delta ratings, mute and ban moderation, and practice matches played
//! by simulated captains, persisting everything as one JSON document.

pub mod bot;
pub mod config;
pub mod draft;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod moderation;
pub mod players;
pub mod queue;
pub mod rating;
pub mod service;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchError, Result};
pub use types::*;

// Re-export key components
pub use draft::{MatchSession, SessionTable};
pub use gateway::{Dispatcher, Notice, Notifier};
pub use queue::QueueManager;
pub use service::Matchmaker;
pub use storage::{SnapshotStore, StateDocument};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
