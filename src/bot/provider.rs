//! Simulated roster provider
//!
//! Practice matches are filled with simulated players. They live in their own
//! negative id namespace (`-100000 - n` for a monotonically increasing `n`),
//! carry a random display name, rating and record, and are never ranked.

use crate::error::{MatchError, Result};
use crate::types::{PlayerId, PlayerProfile};
use crate::utils::win_rate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Offset of the simulated id namespace
pub const SIMULATED_ID_BASE: PlayerId = -100_000;

const SIMULATED_NAMES: [&str; 19] = [
    "Zeus", "Simple", "KennyS", "Device", "Guardian", "Cold", "ElectroNic", "Perfecto", "B1T",
    "Monesy", "JL", "Zywoo", "Faker", "NaVi_Bot", "Twistzz", "Ropz", "NAF", "sh1ro", "Ax1Le",
];

/// Identity of the `n`th simulated player
pub fn simulated_id(n: u64) -> PlayerId {
    SIMULATED_ID_BASE - n as PlayerId
}

/// Trait for allocating simulated players
pub trait RosterProvider: Send + Sync {
    /// Create `count` fresh simulated profiles with unused ids
    fn allocate(&self, count: usize) -> Result<Vec<PlayerProfile>>;

    /// Number of simulated players allocated so far
    fn allocated(&self) -> u64;

    /// Continue allocation after a restored counter
    fn restore_allocated(&self, allocated: u64);
}

/// Provider that draws names and stats at random
#[derive(Debug)]
pub struct RandomRosterProvider {
    rng: Mutex<StdRng>,
    allocated: AtomicU64,
}

impl RandomRosterProvider {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            allocated: AtomicU64::new(0),
        }
    }

    /// Deterministic provider for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            allocated: AtomicU64::new(0),
        }
    }

    fn build_profile<R: Rng>(n: u64, rng: &mut R) -> PlayerProfile {
        let base = SIMULATED_NAMES.choose(rng).copied().unwrap_or("Bot");
        let mut profile = PlayerProfile::new(simulated_id(n), format!("{}#{}", base, n), 0);
        profile.external_id = format!("bot_{}", n);
        profile.rating = rng.gen_range(800..=1800);
        profile.wins = rng.gen_range(0..=60);
        profile.losses = rng.gen_range(0..=60);
        profile.win_rate = win_rate(profile.wins, profile.losses);
        profile.simulated = true;
        profile
    }
}

impl Default for RandomRosterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterProvider for RandomRosterProvider {
    fn allocate(&self, count: usize) -> Result<Vec<PlayerProfile>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| MatchError::lock("simulated roster"))?;

        let profiles: Vec<PlayerProfile> = (0..count)
            .map(|_| {
                let n = self.allocated.fetch_add(1, Ordering::SeqCst) + 1;
                Self::build_profile(n, &mut *rng)
            })
            .collect();

        debug!(
            "Allocated {} simulated players ({} total)",
            profiles.len(),
            self.allocated()
        );
        Ok(profiles)
    }

    fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::SeqCst)
    }

    fn restore_allocated(&self, allocated: u64) {
        self.allocated.fetch_max(allocated, Ordering::SeqCst);
    }
}
