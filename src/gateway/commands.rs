//! Command and choice-token parsing
//!
//! Inbound text is either a slash command (`/play5`, `/ban 42 2h`) or a
//! choice token previously attached to a notice (`join_5v5`, `pk_3_17`,
//! `bn_3_Nuke`). Both parse into a [`Command`].

use crate::error::{MatchError, Result};
use crate::moderation::RestrictionSpan;
use crate::types::{MatchId, Mode, PlayerId, Side};
use crate::utils::parse_duration;

/// Mute length when none is given
pub const DEFAULT_MUTE_SECONDS: u64 = 3600;
/// Ban length when none is given
pub const DEFAULT_BAN_SECONDS: u64 = 86400;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Register {
        external_id: String,
        display_name: String,
    },
    Stats {
        target: Option<PlayerId>,
    },
    Top,
    /// Show a lobby with its join/leave choice
    Lobby(Mode),
    QueueStatus,
    Join(Mode),
    Leave(Mode),
    Pick {
        match_id: MatchId,
        player: PlayerId,
    },
    Ban {
        match_id: MatchId,
        map: String,
    },
    RecordResult {
        match_id: MatchId,
        winner: Side,
    },
    Mute {
        target: PlayerId,
        span: RestrictionSpan,
    },
    Unmute {
        target: PlayerId,
    },
    BanPlayer {
        target: PlayerId,
        span: RestrictionSpan,
    },
    Unban {
        target: PlayerId,
    },
    RatingTable,
    SetRating {
        target: PlayerId,
        value: i32,
    },
    ClearQueue(Option<Mode>),
    Matches,
    /// Caller plus simulated players
    Practice(Mode),
    /// Simulated players only
    Simulate(Mode),
}

impl Command {
    /// Short name used for logging and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Register { .. } => "reg",
            Command::Stats { .. } => "stats",
            Command::Top => "top",
            Command::Lobby(Mode::FiveVsFive) => "play5",
            Command::Lobby(Mode::TwoVsTwo) => "play2",
            Command::QueueStatus => "queue",
            Command::Join(_) => "join",
            Command::Leave(_) => "leave",
            Command::Pick { .. } => "pick",
            Command::Ban { .. } => "ban_map",
            Command::RecordResult { .. } => "win",
            Command::Mute { .. } => "mute",
            Command::Unmute { .. } => "unmute",
            Command::BanPlayer { .. } => "ban",
            Command::Unban { .. } => "unban",
            Command::RatingTable => "elo",
            Command::SetRating { .. } => "setelo",
            Command::ClearQueue(_) => "clearqueue",
            Command::Matches => "matches",
            Command::Practice(Mode::FiveVsFive) => "bots1",
            Command::Practice(Mode::TwoVsTwo) => "bots2",
            Command::Simulate(_) => "simulate",
        }
    }
}

pub fn join_token(mode: Mode) -> String {
    format!("join_{}", mode)
}

pub fn leave_token(mode: Mode) -> String {
    format!("leave_{}", mode)
}

pub fn pick_token(match_id: MatchId, player: PlayerId) -> String {
    format!("pk_{}_{}", match_id, player)
}

pub fn ban_token(match_id: MatchId, map: &str) -> String {
    format!("bn_{}_{}", match_id, map)
}

fn invalid(reason: impl Into<String>) -> anyhow::Error {
    MatchError::ValidationError {
        reason: reason.into(),
    }
    .into()
}

fn parse_mode(raw: &str) -> Result<Mode> {
    raw.parse::<Mode>().map_err(invalid)
}

fn parse_match_id(raw: &str) -> Result<MatchId> {
    raw.parse::<MatchId>()
        .map_err(|_| invalid(format!("'{}' is not a match id", raw)))
}

fn parse_player(raw: Option<&str>, usage: &str) -> Result<PlayerId> {
    let raw = raw.ok_or_else(|| invalid(format!("Usage: {}", usage)))?;
    raw.parse()
        .map_err(|_| invalid(format!("'{}' is not a player id", raw)))
}

fn parse_span(raw: Option<&str>, default_seconds: u64, allow_permanent: bool) -> Result<RestrictionSpan> {
    match raw {
        None => Ok(RestrictionSpan::Seconds(default_seconds)),
        Some(p) if allow_permanent && p.eq_ignore_ascii_case("perm") => Ok(RestrictionSpan::Permanent),
        Some(raw) => parse_duration(raw).map(RestrictionSpan::Seconds),
    }
}

/// Parse a choice token such as `pk_3_17`
pub fn parse_token(token: &str) -> Result<Command> {
    let mut parts = token.splitn(3, '_');
    let kind = parts.next().unwrap_or_default();
    let first = parts.next();
    let rest = parts.next();

    match (kind, first, rest) {
        ("join", Some(mode), None) => Ok(Command::Join(parse_mode(mode)?)),
        ("leave", Some(mode), None) => Ok(Command::Leave(parse_mode(mode)?)),
        ("pk", Some(match_id), Some(player)) => Ok(Command::Pick {
            match_id: parse_match_id(match_id)?,
            player: player
                .parse()
                .map_err(|_| invalid(format!("'{}' is not a player id", player)))?,
        }),
        ("bn", Some(match_id), Some(map)) if !map.is_empty() => Ok(Command::Ban {
            match_id: parse_match_id(match_id)?,
            map: map.to_string(),
        }),
        _ => Err(invalid(format!("Unknown choice '{}'", token))),
    }
}

/// Parse a slash command with its arguments
pub fn parse_command(input: &str) -> Result<Command> {
    let mut words = input.split_whitespace();
    let head = words.next().unwrap_or_default();
    // "/cmd@botname" addresses a specific bot in group chats
    let name = head
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match name.as_str() {
        "start" => Command::Start,
        "reg" => {
            if args.len() < 2 {
                return Err(invalid("Usage: /reg <external_id> <display name>"));
            }
            Command::Register {
                external_id: args[0].to_string(),
                display_name: args[1..].join(" "),
            }
        }
        "stats" => Command::Stats {
            target: args
                .first()
                .map(|raw| parse_player(Some(raw), "/stats [player_id]"))
                .transpose()?,
        },
        "top" => Command::Top,
        "play5" => Command::Lobby(Mode::FiveVsFive),
        "play2" => Command::Lobby(Mode::TwoVsTwo),
        "queue" => Command::QueueStatus,
        "leave" => {
            let mode = args
                .first()
                .ok_or_else(|| invalid("Usage: /leave <5v5|2v2>"))?;
            Command::Leave(parse_mode(mode)?)
        }
        "win" => {
            if args.len() < 2 {
                return Err(invalid("Usage: /win <match_id> <ct|t>"));
            }
            Command::RecordResult {
                match_id: parse_match_id(args[0])?,
                winner: args[1].parse::<Side>().map_err(invalid)?,
            }
        }
        "mute" => Command::Mute {
            target: parse_player(args.first().copied(), "/mute <player_id> [30m|2h|1d]")?,
            span: parse_span(args.get(1).copied(), DEFAULT_MUTE_SECONDS, false)?,
        },
        "unmute" => Command::Unmute {
            target: parse_player(args.first().copied(), "/unmute <player_id>")?,
        },
        "ban" => Command::BanPlayer {
            target: parse_player(args.first().copied(), "/ban <player_id> [30m|2h|1d|perm]")?,
            span: parse_span(args.get(1).copied(), DEFAULT_BAN_SECONDS, true)?,
        },
        "unban" => Command::Unban {
            target: parse_player(args.first().copied(), "/unban <player_id>")?,
        },
        "elo" => Command::RatingTable,
        "setelo" => {
            if args.len() < 2 {
                return Err(invalid("Usage: /setelo <player_id> <rating>"));
            }
            Command::SetRating {
                target: parse_player(Some(args[0]), "/setelo <player_id> <rating>")?,
                value: args[1]
                    .parse()
                    .map_err(|_| invalid(format!("'{}' is not a rating", args[1])))?,
            }
        }
        "clearqueue" => match args.first() {
            None => Command::ClearQueue(None),
            Some(which) if which.eq_ignore_ascii_case("all") => Command::ClearQueue(None),
            Some(which) => Command::ClearQueue(Some(parse_mode(which)?)),
        },
        "matches" => Command::Matches,
        "bots1" => Command::Practice(Mode::FiveVsFive),
        "bots2" => Command::Practice(Mode::TwoVsTwo),
        "simulate" => Command::Simulate(match args.first() {
            Some(mode) => parse_mode(mode)?,
            None => Mode::FiveVsFive,
        }),
        _ => return Err(invalid(format!("Unknown command '{}'", head))),
    };
    Ok(command)
}

/// Parse either form of input
pub fn parse(input: &str) -> Result<Command> {
    let input = input.trim();
    if input.starts_with('/') {
        parse_command(input)
    } else {
        parse_token(input)
    }
}
