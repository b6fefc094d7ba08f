//! Persisted state document and schema migration
//!
//! Version 1 is the current layout. Documents without a `schema_version`
//! field are version 0: the older keyed-map layout, in which most fields were
//! optional. Migration runs once at load, before the document is used.

use crate::config::draft::DEFAULT_MAPS;
use crate::draft::MatchSession;
use crate::error::{MatchError, Result};
use crate::moderation::ModerationRecord;
use crate::queue::QueueSnapshot;
use crate::types::{is_simulated_id, MatchId, Mode, Phase, PlayerId, PlayerProfile};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Layout version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Everything needed to resume the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub players: Vec<PlayerProfile>,
    #[serde(default)]
    pub queues: Vec<QueueSnapshot>,
    #[serde(default)]
    pub sessions: Vec<MatchSession>,
    #[serde(default)]
    pub moderation: Vec<ModerationRecord>,
    #[serde(default)]
    pub match_counter: u64,
    #[serde(default)]
    pub simulated_counter: u64,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            players: Vec::new(),
            queues: Vec::new(),
            sessions: Vec::new(),
            moderation: Vec::new(),
            match_counter: 0,
            simulated_counter: 0,
            saved_at: None,
        }
    }
}

impl StateDocument {
    /// Parse raw JSON, migrating older layouts
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| MatchError::Persistence {
            message: format!("state document is not valid JSON: {}", e),
        })?;
        migrate(value)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            MatchError::Persistence {
                message: format!("failed to serialize state document: {}", e),
            }
            .into()
        })
    }
}

/// Bring a parsed document up to [`SCHEMA_VERSION`]
pub fn migrate(value: Value) -> Result<StateDocument> {
    if !value.is_object() {
        return Err(MatchError::Persistence {
            message: "state document must be a JSON object".to_string(),
        }
        .into());
    }

    let version = match value.get("schema_version") {
        None => 0,
        Some(v) => v.as_u64().ok_or_else(|| MatchError::Persistence {
            message: format!("schema_version must be a number, found {}", v),
        })?,
    };

    let document = match version {
        0 => migrate_v0_to_v1(value)?,
        1 => serde_json::from_value(value).map_err(|e| MatchError::Persistence {
            message: format!("malformed state document: {}", e),
        })?,
        v => {
            return Err(MatchError::Persistence {
                message: format!(
                    "state document version {} is newer than supported version {}",
                    v, SCHEMA_VERSION
                ),
            }
            .into())
        }
    };

    if version != u64::from(SCHEMA_VERSION) {
        info!(
            "Migrated state document from version {} to {}",
            version, SCHEMA_VERSION
        );
    }
    Ok(document)
}

#[derive(Debug, Default, Deserialize)]
struct LegacyDocument {
    #[serde(default)]
    players: HashMap<String, LegacyPlayer>,
    #[serde(default)]
    queue_5v5: Vec<PlayerId>,
    #[serde(default)]
    queue_2v2: Vec<PlayerId>,
    #[serde(default)]
    active_matches: BTreeMap<String, LegacyMatch>,
    #[serde(default)]
    muted: HashMap<String, f64>,
    #[serde(default)]
    banned: HashMap<String, f64>,
    #[serde(default)]
    match_counter: u64,
    #[serde(default)]
    bot_counter: u64,
}

#[derive(Debug, Deserialize)]
struct LegacyPlayer {
    #[serde(default)]
    user_id: Option<PlayerId>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    external_id: String,
    #[serde(default = "legacy_default_rating")]
    elo: i32,
    #[serde(default)]
    wins: u32,
    #[serde(default)]
    losses: u32,
    #[serde(default)]
    avg: f64,
    #[serde(default)]
    is_bot: bool,
}

fn legacy_default_rating() -> i32 {
    1000
}

#[derive(Debug, Deserialize)]
struct LegacyMatch {
    #[serde(default)]
    mode: Option<String>,
    ct: Vec<PlayerId>,
    t: Vec<PlayerId>,
    #[serde(default)]
    pool: Vec<PlayerId>,
    turn: PlayerId,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    maps: Option<Vec<String>>,
    #[serde(default)]
    banned_maps: Vec<String>,
    #[serde(default)]
    pick_start_time: f64,
    #[serde(default = "legacy_default_timeout")]
    pick_timeout: u64,
    #[serde(default)]
    chat_id: i64,
}

fn legacy_default_timeout() -> u64 {
    60
}

fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

fn migrate_v0_to_v1(value: Value) -> Result<StateDocument> {
    let legacy: LegacyDocument =
        serde_json::from_value(value).map_err(|e| MatchError::Persistence {
            message: format!("malformed legacy state document: {}", e),
        })?;

    let mut players: Vec<PlayerProfile> = legacy
        .players
        .into_iter()
        .filter_map(|(key, p)| {
            let id = p.user_id.or_else(|| key.parse().ok())?;
            Some(PlayerProfile {
                id,
                display_name: p.nickname.unwrap_or_else(|| "Player".to_string()),
                external_id: p.external_id,
                rating: p.elo,
                wins: p.wins,
                losses: p.losses,
                win_rate: p.avg,
                simulated: p.is_bot || is_simulated_id(id),
            })
        })
        .collect();
    players.sort_by_key(|p| p.id);

    let queues = vec![
        QueueSnapshot {
            mode: Mode::FiveVsFive,
            capacity: 10,
            members: legacy.queue_5v5,
        },
        QueueSnapshot {
            mode: Mode::TwoVsTwo,
            capacity: 4,
            members: legacy.queue_2v2,
        },
    ];

    let mut sessions = Vec::new();
    for (key, m) in legacy.active_matches {
        match legacy_session(&key, m) {
            Some(session) => sessions.push(session),
            None => warn!("Dropping unreadable legacy match {}", key),
        }
    }

    let mut records: BTreeMap<PlayerId, ModerationRecord> = BTreeMap::new();
    for (key, until) in legacy.muted {
        if let (Ok(id), Some(until)) = (key.parse::<PlayerId>(), from_epoch_seconds(until)) {
            records
                .entry(id)
                .or_insert_with(|| empty_record(id))
                .mute_until = Some(until);
        }
    }
    for (key, until) in legacy.banned {
        if let (Ok(id), Some(until)) = (key.parse::<PlayerId>(), from_epoch_seconds(until)) {
            records
                .entry(id)
                .or_insert_with(|| empty_record(id))
                .ban_until = Some(until);
        }
    }

    Ok(StateDocument {
        schema_version: SCHEMA_VERSION,
        players,
        queues,
        sessions,
        moderation: records.into_values().collect(),
        match_counter: legacy.match_counter,
        simulated_counter: legacy.bot_counter,
        saved_at: None,
    })
}

fn empty_record(player_id: PlayerId) -> ModerationRecord {
    ModerationRecord {
        player_id,
        mute_until: None,
        ban_until: None,
    }
}

fn legacy_session(key: &str, m: LegacyMatch) -> Option<MatchSession> {
    let id = MatchId(key.parse().ok()?);
    let mode = m
        .mode
        .as_deref()
        .unwrap_or("5v5")
        .parse::<Mode>()
        .ok()?;
    let phase = match m.phase.as_deref().unwrap_or("pick") {
        "pick" => Phase::Picking,
        "ban" => Phase::Banning,
        _ => return None,
    };

    Some(MatchSession {
        id,
        mode,
        ct_captain: *m.ct.first()?,
        t_captain: *m.t.first()?,
        ct_roster: m.ct,
        t_roster: m.t,
        pool: m.pool,
        maps: m
            .maps
            .unwrap_or_else(|| DEFAULT_MAPS.iter().map(|s| s.to_string()).collect()),
        banned_maps: m.banned_maps,
        turn: m.turn,
        phase,
        pick_started_at: from_epoch_seconds(m.pick_start_time)?,
        pick_timeout_seconds: m.pick_timeout,
        channel: m.chat_id,
    })
}
