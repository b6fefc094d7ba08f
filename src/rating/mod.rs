//! Rating ledger
//!
//! Results move ratings by fixed deltas through a [`RatingCalculator`];
//! simulated players are never rated.

pub mod calculator;
pub mod ledger;

// Re-export commonly used types
pub use calculator::{FixedDeltaCalculator, RatingCalculator};
pub use ledger::{MatchResult, RatingLedger};
