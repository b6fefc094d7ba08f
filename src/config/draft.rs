//! Draft configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Map catalog every match starts from
pub const DEFAULT_MAPS: [&str; 7] = [
    "Dust2", "Inferno", "Mirage", "Nuke", "Overpass", "Anubis", "Vertigo",
];

/// Draft and ban settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Map catalog, in display order
    pub maps: Vec<String>,
    /// Seconds allowed for the whole pick phase
    pub pick_timeout_seconds: u64,
    /// Pause before each simulated captain action
    pub autoplay_delay_ms: u64,
    /// Upper bound on chained simulated actions per run
    pub autoplay_max_steps: usize,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            maps: DEFAULT_MAPS.iter().map(|m| m.to_string()).collect(),
            pick_timeout_seconds: 60,
            autoplay_delay_ms: 2000,
            autoplay_max_steps: 64,
        }
    }
}

impl DraftConfig {
    pub fn pick_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pick_timeout_seconds as i64)
    }

    pub fn autoplay_delay(&self) -> Duration {
        Duration::from_millis(self.autoplay_delay_ms)
    }

    /// Actions a fully simulated match of `capacity` players takes to reach
    /// a decided map: every pick but the auto-assigned last one, then bans
    /// down to one map
    pub fn simulated_actions(&self, capacity: usize) -> usize {
        capacity.saturating_sub(3) + self.maps.len().saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.maps.len() < 2 {
            return Err(anyhow!("Map catalog needs at least 2 maps"));
        }
        let unique: HashSet<&str> = self.maps.iter().map(String::as_str).collect();
        if unique.len() != self.maps.len() {
            return Err(anyhow!("Map catalog contains duplicates"));
        }
        if self.maps.iter().any(|m| m.is_empty() || m.contains(char::is_whitespace)) {
            return Err(anyhow!("Map names must be non-empty single words"));
        }
        if self.pick_timeout_seconds == 0 {
            return Err(anyhow!("Pick timeout must be greater than 0"));
        }
        if self.autoplay_max_steps == 0 {
            return Err(anyhow!("Autoplay step bound must be greater than 0"));
        }
        Ok(())
    }
}
