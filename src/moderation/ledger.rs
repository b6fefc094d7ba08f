//! Moderation ledger
//!
//! Each identity has at most one record holding an optional expiry per
//! restriction kind. A restriction is active while `now < expiry`; expired
//! entries stay in the record until lifted or overwritten.

use crate::error::{MatchError, Result};
use crate::types::{PlayerId, RestrictionKind};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Epoch second used as the expiry of permanent restrictions
pub const PERMANENT_EXPIRY_SECONDS: i64 = 9_999_999_999;

/// How long a restriction lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionSpan {
    Seconds(u64),
    Permanent,
}

impl RestrictionSpan {
    /// Expiry timestamp when the restriction starts at `now`
    pub fn expiry_from(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let permanent = permanent_expiry();
        match self {
            RestrictionSpan::Permanent => permanent,
            RestrictionSpan::Seconds(secs) => i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|d| now.checked_add_signed(d))
                .map(|t| t.min(permanent))
                .unwrap_or(permanent),
        }
    }
}

fn permanent_expiry() -> DateTime<Utc> {
    Utc.timestamp_opt(PERMANENT_EXPIRY_SECONDS, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Restrictions held against one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub player_id: PlayerId,
    #[serde(default)]
    pub mute_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ban_until: Option<DateTime<Utc>>,
}

impl ModerationRecord {
    fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            mute_until: None,
            ban_until: None,
        }
    }

    fn slot(&mut self, kind: RestrictionKind) -> &mut Option<DateTime<Utc>> {
        match kind {
            RestrictionKind::Mute => &mut self.mute_until,
            RestrictionKind::Ban => &mut self.ban_until,
        }
    }

    pub fn expiry(&self, kind: RestrictionKind) -> Option<DateTime<Utc>> {
        match kind {
            RestrictionKind::Mute => self.mute_until,
            RestrictionKind::Ban => self.ban_until,
        }
    }

    fn is_empty(&self) -> bool {
        self.mute_until.is_none() && self.ban_until.is_none()
    }
}

/// Identity → restriction table
#[derive(Debug, Default)]
pub struct ModerationLedger {
    records: RwLock<HashMap<PlayerId, ModerationRecord>>,
}

impl ModerationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a restriction, replacing any previous one of the same kind
    pub fn restrict(
        &self,
        player_id: PlayerId,
        kind: RestrictionKind,
        span: RestrictionSpan,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let until = span.expiry_from(now);
        let mut records = self
            .records
            .write()
            .map_err(|_| MatchError::lock("moderation"))?;
        *records
            .entry(player_id)
            .or_insert_with(|| ModerationRecord::new(player_id))
            .slot(kind) = Some(until);

        info!("Applied {} to player {} until {}", kind, player_id, until);
        Ok(until)
    }

    /// Delete a restriction outright. Returns whether one was stored.
    pub fn lift(&self, player_id: PlayerId, kind: RestrictionKind) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|_| MatchError::lock("moderation"))?;

        let Some(record) = records.get_mut(&player_id) else {
            return Ok(false);
        };
        let removed = record.slot(kind).take().is_some();
        if record.is_empty() {
            records.remove(&player_id);
        }

        if removed {
            info!("Lifted {} from player {}", kind, player_id);
        }
        Ok(removed)
    }

    /// Expiry of the restriction if it is active at `now`
    pub fn active_until(
        &self,
        player_id: PlayerId,
        kind: RestrictionKind,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let records = self
            .records
            .read()
            .map_err(|_| MatchError::lock("moderation"))?;
        Ok(records
            .get(&player_id)
            .and_then(|r| r.expiry(kind))
            .filter(|until| now < *until))
    }

    pub fn is_active(
        &self,
        player_id: PlayerId,
        kind: RestrictionKind,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.active_until(player_id, kind, now)?.is_some())
    }

    pub fn snapshot(&self) -> Result<Vec<ModerationRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| MatchError::lock("moderation"))?;
        let mut all: Vec<ModerationRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.player_id);
        Ok(all)
    }

    pub fn restore(&self, restored: Vec<ModerationRecord>) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| MatchError::lock("moderation"))?;
        records.clear();
        for record in restored.into_iter().filter(|r| !r.is_empty()) {
            records.insert(record.player_id, record);
        }
        Ok(())
    }
}
