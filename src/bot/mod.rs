//! Simulated captains
//!
//! Practice matches are filled with simulated players from a roster provider,
//! and simulated captains play their turns through the autoplay scheduler.

pub mod autoplay;
pub mod provider;

// Re-export commonly used types
pub use autoplay::{AutoplayScheduler, AutoplayStep, SimulatedTurnDriver};
pub use provider::{simulated_id, RandomRosterProvider, RosterProvider, SIMULATED_ID_BASE};
