//! Common types used throughout the draft-room service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier for players. Real players are positive, simulated captains negative.
pub type PlayerId = i64;

/// Identifier of the chat channel a match reports to
pub type ChannelId = i64;

/// Returns true when the id belongs to the simulated namespace
pub fn is_simulated_id(id: PlayerId) -> bool {
    id < 0
}

/// Monotonic match identifier, rendered as a plain number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MatchId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(MatchId)
    }
}

/// Game mode a player queues for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "5v5")]
    FiveVsFive,
    #[serde(rename = "2v2")]
    TwoVsTwo,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::FiveVsFive, Mode::TwoVsTwo];

    /// The mode whose queue conflicts with this one
    pub fn other(self) -> Mode {
        match self {
            Mode::FiveVsFive => Mode::TwoVsTwo,
            Mode::TwoVsTwo => Mode::FiveVsFive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::FiveVsFive => "5v5",
            Mode::TwoVsTwo => "2v2",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "5v5" => Ok(Mode::FiveVsFive),
            "2v2" => Ok(Mode::TwoVsTwo),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// One of the two squads in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Ct,
    T,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Ct => Side::T,
            Side::T => Side::Ct,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Ct => write!(f, "CT"),
            Side::T => write!(f, "T"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ct" => Ok(Side::Ct),
            "t" => Ok(Side::T),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// Phase of a draft session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Picking,
    Banning,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Picking => write!(f, "pick"),
            Phase::Banning => write!(f, "ban"),
        }
    }
}

/// Kind of restriction the moderation ledger tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionKind {
    Mute,
    Ban,
}

impl fmt::Display for RestrictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestrictionKind::Mute => write!(f, "mute"),
            RestrictionKind::Ban => write!(f, "ban"),
        }
    }
}

/// Player profile kept by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub display_name: String,
    #[serde(default)]
    pub external_id: String,
    pub rating: i32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub simulated: bool,
}

impl PlayerProfile {
    /// Unregistered profile created on first reference
    pub fn new(id: PlayerId, display_name: impl Into<String>, rating: i32) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            external_id: String::new(),
            rating,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            simulated: is_simulated_id(id),
        }
    }

    pub fn is_registered(&self) -> bool {
        !self.external_id.is_empty()
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses
    }

    /// Recompute the derived win-rate from the counters
    pub fn refresh_win_rate(&mut self) {
        self.win_rate = crate::utils::win_rate(self.wins, self.losses);
    }

    /// Tier icon shown next to the rating
    pub fn rank_icon(&self) -> &'static str {
        match self.rating {
            r if r >= 2000 => "💎",
            r if r >= 1500 => "🔥",
            r if r >= 1300 => "⭐",
            r if r >= 1100 => "⚡",
            _ => "🟢",
        }
    }
}

/// Rating change applied to one player by a recorded result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub old_rating: i32,
    pub new_rating: i32,
    pub won: bool,
}
