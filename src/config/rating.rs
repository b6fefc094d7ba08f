//! Rating system configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Fixed-delta rating settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub initial_rating: i32,
    pub win_delta: i32,
    pub loss_delta: i32,
    pub rating_floor: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1000,
            win_delta: 25,
            loss_delta: 20,
            rating_floor: 100,
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.win_delta < 0 || self.loss_delta < 0 {
            return Err(anyhow!("Rating deltas must not be negative"));
        }
        if self.initial_rating < self.rating_floor {
            return Err(anyhow!("Initial rating cannot be below the rating floor"));
        }
        Ok(())
    }
}
