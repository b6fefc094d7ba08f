//! In-memory player registry

use crate::error::{MatchError, Result};
use crate::rating::calculator::RatingCalculator;
use crate::types::{PlayerId, PlayerProfile, RatingChange};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

/// Longest display name accepted at registration
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Name used for profiles created by a result that references an unseen id
const UNKNOWN_NAME: &str = "Unknown";

/// Identity → profile table
#[derive(Debug)]
pub struct PlayerRegistry {
    profiles: RwLock<HashMap<PlayerId, PlayerProfile>>,
    initial_rating: i32,
}

impl PlayerRegistry {
    pub fn new(initial_rating: i32) -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            initial_rating,
        }
    }

    /// Look up a profile without creating it
    pub fn get(&self, id: PlayerId) -> Result<Option<PlayerProfile>> {
        let profiles = self.profiles.read().map_err(|_| MatchError::lock("players"))?;
        Ok(profiles.get(&id).cloned())
    }

    /// Return the profile for `id`, creating an unregistered one on first reference
    pub fn get_or_create(&self, id: PlayerId, display_name: &str) -> Result<PlayerProfile> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| MatchError::lock("players"))?;
        let profile = profiles.entry(id).or_insert_with(|| {
            debug!("Creating profile for player {} on first reference", id);
            PlayerProfile::new(id, display_name, self.initial_rating)
        });
        Ok(profile.clone())
    }

    /// Display name for rendering, falling back to the raw id
    pub fn display_name(&self, id: PlayerId) -> String {
        match self.get(id) {
            Ok(Some(profile)) => profile.display_name,
            _ => format!("#{}", id),
        }
    }

    pub fn is_registered(&self, id: PlayerId) -> Result<bool> {
        Ok(self.get(id)?.map(|p| p.is_registered()).unwrap_or(false))
    }

    /// Register a real player under an external id and display name.
    ///
    /// Fails when the player is already registered, when the name is empty or
    /// longer than [`MAX_DISPLAY_NAME_LEN`] characters, or when another real
    /// player already holds the external id.
    pub fn register(
        &self,
        id: PlayerId,
        external_id: &str,
        display_name: &str,
    ) -> Result<PlayerProfile> {
        let external_id = external_id.trim();
        let display_name = display_name.trim();

        if external_id.is_empty() {
            return Err(MatchError::ValidationError {
                reason: "External id cannot be empty".to_string(),
            }
            .into());
        }
        if display_name.is_empty() {
            return Err(MatchError::ValidationError {
                reason: "Display name cannot be empty".to_string(),
            }
            .into());
        }
        if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(MatchError::ValidationError {
                reason: format!(
                    "Display name is too long (max {} characters)",
                    MAX_DISPLAY_NAME_LEN
                ),
            }
            .into());
        }

        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| MatchError::lock("players"))?;

        if profiles.get(&id).map(|p| p.is_registered()).unwrap_or(false) {
            return Err(MatchError::ValidationError {
                reason: "Already registered, ask an administrator to change your details"
                    .to_string(),
            }
            .into());
        }

        let taken = profiles
            .values()
            .any(|p| !p.simulated && p.id != id && p.external_id == external_id);
        if taken {
            return Err(MatchError::ValidationError {
                reason: format!("External id '{}' is already registered", external_id),
            }
            .into());
        }

        let profile = profiles
            .entry(id)
            .or_insert_with(|| PlayerProfile::new(id, display_name, self.initial_rating));
        profile.display_name = display_name.to_string();
        profile.external_id = external_id.to_string();

        info!(
            "Registered player {} as '{}' [{}]",
            id, profile.display_name, profile.external_id
        );
        Ok(profile.clone())
    }

    /// Insert or replace a profile wholesale (simulated roster allocation)
    pub fn insert(&self, profile: PlayerProfile) -> Result<()> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| MatchError::lock("players"))?;
        profiles.insert(profile.id, profile);
        Ok(())
    }

    /// Administrative rating override, clamped by the calculator's floor
    pub fn set_rating(
        &self,
        id: PlayerId,
        value: i32,
        calculator: &dyn RatingCalculator,
    ) -> Result<RatingChange> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| MatchError::lock("players"))?;
        let profile = profiles
            .get_mut(&id)
            .ok_or(MatchError::NotRegistered { player_id: id })?;

        let old_rating = profile.rating;
        profile.rating = calculator.clamp(value);
        info!(
            "Rating override for player {}: {} -> {}",
            id, old_rating, profile.rating
        );

        Ok(RatingChange {
            player_id: id,
            old_rating,
            new_rating: profile.rating,
            won: false,
        })
    }

    /// Apply one match outcome to every listed player under a single write lock.
    ///
    /// Unknown ids get an "Unknown" profile first. Simulated players are
    /// skipped entirely and produce no change entry.
    pub fn apply_outcomes(
        &self,
        outcomes: &[(PlayerId, bool)],
        calculator: &dyn RatingCalculator,
    ) -> Result<Vec<RatingChange>> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| MatchError::lock("players"))?;

        let mut changes = Vec::with_capacity(outcomes.len());
        for &(id, won) in outcomes {
            let profile = profiles
                .entry(id)
                .or_insert_with(|| PlayerProfile::new(id, UNKNOWN_NAME, self.initial_rating));
            if profile.simulated {
                continue;
            }

            let old_rating = profile.rating;
            if won {
                profile.wins += 1;
                profile.rating = calculator.after_win(old_rating);
            } else {
                profile.losses += 1;
                profile.rating = calculator.after_loss(old_rating);
            }
            profile.refresh_win_rate();

            changes.push(RatingChange {
                player_id: id,
                old_rating,
                new_rating: profile.rating,
                won,
            });
        }

        Ok(changes)
    }

    /// Registered real players, best rating first
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerProfile>> {
        let mut ranked = self.ranked_profiles()?;
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Number of players eligible for the leaderboard
    pub fn ranked_count(&self) -> Result<usize> {
        Ok(self.ranked_profiles()?.len())
    }

    fn ranked_profiles(&self) -> Result<Vec<PlayerProfile>> {
        let profiles = self.profiles.read().map_err(|_| MatchError::lock("players"))?;
        let mut ranked: Vec<PlayerProfile> = profiles
            .values()
            .filter(|p| p.is_registered() && !p.simulated)
            .cloned()
            .collect();
        ranked.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));
        Ok(ranked)
    }

    /// Public statistics for a registered real player
    pub fn stats(&self, id: PlayerId) -> Result<PlayerProfile> {
        match self.get(id)? {
            Some(profile) if profile.is_registered() && !profile.simulated => Ok(profile),
            _ => Err(MatchError::NotRegistered { player_id: id }.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All profiles ordered by id, for persistence
    pub fn snapshot(&self) -> Result<Vec<PlayerProfile>> {
        let profiles = self.profiles.read().map_err(|_| MatchError::lock("players"))?;
        let mut all: Vec<PlayerProfile> = profiles.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }

    /// Replace the table with restored profiles
    pub fn restore(&self, restored: Vec<PlayerProfile>) -> Result<()> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| MatchError::lock("players"))?;
        profiles.clear();
        for mut profile in restored {
            profile.simulated = profile.simulated || crate::types::is_simulated_id(profile.id);
            profiles.insert(profile.id, profile);
        }
        Ok(())
    }
}
