//! Queue configuration

use crate::types::Mode;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Capacity of each mode's queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub five_vs_five_capacity: usize,
    pub two_vs_two_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            five_vs_five_capacity: 10,
            two_vs_two_capacity: 4,
        }
    }
}

impl QueueConfig {
    pub fn capacity(&self, mode: Mode) -> usize {
        match mode {
            Mode::FiveVsFive => self.five_vs_five_capacity,
            Mode::TwoVsTwo => self.two_vs_two_capacity,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for mode in Mode::ALL {
            let capacity = self.capacity(mode);
            // two captains plus at least one pick each way
            if capacity < 4 || capacity % 2 != 0 {
                return Err(anyhow!(
                    "{} capacity must be an even number of at least 4, got {}",
                    mode,
                    capacity
                ));
            }
        }
        Ok(())
    }
}
