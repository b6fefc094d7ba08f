//! Access gate for actor-facing operations

use crate::error::{MatchError, Result};
use crate::moderation::ModerationLedger;
use crate::players::PlayerRegistry;
use crate::types::{PlayerId, RestrictionKind};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// What the actor is trying to do; mutes only block queue joins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    /// Joining a matchmaking queue
    JoinQueue,
    /// Registration, which needs no prior registration
    Register,
    /// Any other player command or choice
    Play,
}

/// Checks bans, mutes and registration in that order. Admins always pass.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    admins: HashSet<PlayerId>,
}

impl AccessGate {
    pub fn new(admins: impl IntoIterator<Item = PlayerId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, id: PlayerId) -> bool {
        self.admins.contains(&id)
    }

    /// Fails with `PermissionDenied` unless `id` is an admin
    pub fn require_admin(&self, id: PlayerId) -> Result<()> {
        if self.is_admin(id) {
            Ok(())
        } else {
            Err(MatchError::PermissionDenied {
                reason: "administrator command".to_string(),
            }
            .into())
        }
    }

    pub fn check(
        &self,
        id: PlayerId,
        action: GatedAction,
        registry: &PlayerRegistry,
        moderation: &ModerationLedger,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.is_admin(id) {
            return Ok(());
        }

        if let Some(until) = moderation.active_until(id, RestrictionKind::Ban, now)? {
            return Err(MatchError::Banned {
                player_id: id,
                until,
            }
            .into());
        }

        if action == GatedAction::JoinQueue {
            if let Some(until) = moderation.active_until(id, RestrictionKind::Mute, now)? {
                return Err(MatchError::Muted {
                    player_id: id,
                    until,
                }
                .into());
            }
        }

        if action != GatedAction::Register && !registry.is_registered(id)? {
            return Err(MatchError::NotRegistered { player_id: id }.into());
        }

        Ok(())
    }
}
