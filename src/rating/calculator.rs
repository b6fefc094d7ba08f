//! Rating calculator trait and the fixed-delta implementation
//!
//! Ratings move by a constant amount per result: winners gain the win delta,
//! losers drop by the loss delta but never below the configured floor.

use crate::config::RatingConfig;

/// Trait for turning a single result into a new rating
pub trait RatingCalculator: Send + Sync {
    /// Rating after a win
    fn after_win(&self, rating: i32) -> i32;

    /// Rating after a loss, floor-clamped
    fn after_loss(&self, rating: i32) -> i32;

    /// Clamp an arbitrary value to the rating floor
    fn clamp(&self, rating: i32) -> i32;

    /// Rating given to new profiles
    fn initial_rating(&self) -> i32;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;
}

/// Constant win/loss deltas with a hard floor
#[derive(Debug, Clone)]
pub struct FixedDeltaCalculator {
    initial_rating: i32,
    win_delta: i32,
    loss_delta: i32,
    floor: i32,
}

impl FixedDeltaCalculator {
    pub fn new(config: &RatingConfig) -> Self {
        Self {
            initial_rating: config.initial_rating,
            win_delta: config.win_delta,
            loss_delta: config.loss_delta,
            floor: config.rating_floor,
        }
    }

    pub fn win_delta(&self) -> i32 {
        self.win_delta
    }

    pub fn loss_delta(&self) -> i32 {
        self.loss_delta
    }
}

impl Default for FixedDeltaCalculator {
    fn default() -> Self {
        Self::new(&RatingConfig::default())
    }
}

impl RatingCalculator for FixedDeltaCalculator {
    fn after_win(&self, rating: i32) -> i32 {
        rating.saturating_add(self.win_delta)
    }

    fn after_loss(&self, rating: i32) -> i32 {
        self.clamp(rating.saturating_sub(self.loss_delta))
    }

    fn clamp(&self, rating: i32) -> i32 {
        rating.max(self.floor)
    }

    fn initial_rating(&self) -> i32 {
        self.initial_rating
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "fixed_delta",
            "initial_rating": self.initial_rating,
            "win_delta": self.win_delta,
            "loss_delta": self.loss_delta,
            "floor": self.floor,
        })
    }
}
