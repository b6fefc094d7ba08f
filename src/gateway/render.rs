//! Plain-text rendering of queue, draft and ledger state

use crate::draft::{DraftEvent, MatchSession, SessionSummary};
use crate::error::match_error;
use crate::gateway::commands::{ban_token, join_token, leave_token, pick_token};
use crate::gateway::notifier::Choice;
use crate::players::PlayerRegistry;
use crate::queue::QueueSnapshot;
use crate::rating::MatchResult;
use crate::types::{MatchId, Mode, Phase, PlayerId, PlayerProfile, RestrictionKind, Side};
use chrono::{DateTime, Utc};
use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━";
const MEDALS: [&str; 10] = ["🥇", "🥈", "🥉", "4.", "5.", "6.", "7.", "8.", "9.", "10."];

fn external_or_placeholder(profile: &PlayerProfile) -> &str {
    if profile.external_id.is_empty() {
        "?"
    } else {
        &profile.external_id
    }
}

fn win_rate_text(profile: &PlayerProfile) -> String {
    if profile.games_played() == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", profile.win_rate)
    }
}

fn profile_of(registry: &PlayerRegistry, id: PlayerId) -> PlayerProfile {
    registry
        .get(id)
        .ok()
        .flatten()
        .unwrap_or_else(|| PlayerProfile::new(id, registry.display_name(id), 0))
}

/// `icon name [external] • rating`
pub fn player_line(profile: &PlayerProfile) -> String {
    format!(
        "{} {} [{}] • {}",
        profile.rank_icon(),
        profile.display_name,
        external_or_placeholder(profile),
        profile.rating
    )
}

fn side_marker(side: Side) -> &'static str {
    match side {
        Side::Ct => "🔵 CT",
        Side::T => "🔴 T",
    }
}

fn mode_marker(mode: Mode) -> &'static str {
    match mode {
        Mode::FiveVsFive => "🎮",
        Mode::TwoVsTwo => "⚡",
    }
}

pub fn welcome(profile: Option<&PlayerProfile>) -> String {
    match profile {
        Some(p) => format!(
            "👋 Hello, {}!\nID: {}\n{} {} rating\n\nCommands:\n/play5 5v5 lobby\n/play2 2v2 lobby\n/stats profile\n/top leaderboard\n/queue queue status",
            p.display_name,
            external_or_placeholder(p),
            p.rank_icon(),
            p.rating
        ),
        None => "👋 Welcome!\n\nRegister before using other commands:\n/reg <external_id> <display name>\n\nExample: /reg abc123 ProPlayer".to_string(),
    }
}

pub fn registered(profile: &PlayerProfile) -> String {
    format!(
        "✅ Registered!\n\nName: {}\nID: {}\n\nJoin a queue with /play5 or /play2",
        profile.display_name, profile.external_id
    )
}

/// Lobby listing for one mode in join order
pub fn lobby(snapshot: &QueueSnapshot, registry: &PlayerRegistry) -> String {
    let mut text = format!(
        "{} Lobby {}  {}/{}\n{}",
        mode_marker(snapshot.mode),
        snapshot.mode,
        snapshot.size(),
        snapshot.capacity,
        RULE
    );
    if snapshot.members.is_empty() {
        text.push_str("\n  queue is empty");
    }
    for (i, id) in snapshot.members.iter().enumerate() {
        let _ = write!(text, "\n{}. {}", i + 1, player_line(&profile_of(registry, *id)));
    }
    let _ = write!(text, "\n{}", RULE);
    text
}

/// Join or leave button, depending on whether the viewer is queued
pub fn lobby_choices(mode: Mode, viewer_queued: bool) -> Vec<Choice> {
    if viewer_queued {
        vec![Choice::new("❌ Leave queue", leave_token(mode))]
    } else {
        vec![Choice::new("✅ Join", join_token(mode))]
    }
}

pub fn queue_status(snapshots: &[QueueSnapshot]) -> String {
    let mut text = "📊 Queues\n".to_string();
    for snapshot in snapshots {
        let _ = write!(
            text,
            "\n{} {}: {}/{}",
            mode_marker(snapshot.mode),
            snapshot.mode,
            snapshot.size(),
            snapshot.capacity
        );
    }
    text
}

pub fn queue_left(mode: Mode, remaining: usize) -> String {
    format!("You left the {} queue ({} still waiting)", mode, remaining)
}

pub fn match_started(session: &MatchSession, registry: &PlayerRegistry) -> String {
    let ct = profile_of(registry, session.ct_captain);
    let t = profile_of(registry, session.t_captain);
    format!(
        "🆕 Match #{} [{}]\n\n🔵 CT captain: {} [{}]\n🔴 T captain: {} [{}]\n\n👥 In pool: {} players\n⏳ Pick time: {} s",
        session.id,
        session.mode,
        ct.display_name,
        external_or_placeholder(&ct),
        t.display_name,
        external_or_placeholder(&t),
        session.pool.len(),
        session.pick_timeout_seconds
    )
}

fn roster_block(session: &MatchSession, side: Side, registry: &PlayerRegistry) -> String {
    let mut text = format!("{}:", side_marker(side));
    for id in session.roster(side) {
        let marker = if *id == session.captain(side) { " (c)" } else { "" };
        let _ = write!(
            text,
            "\n  {}{}",
            player_line(&profile_of(registry, *id)),
            marker
        );
    }
    text
}

/// Rosters and whose turn it is, plus the choices the acting captain has.
///
/// Choices are only offered to human captains; a simulated captain's turn
/// shows a waiting line instead.
pub fn draft_prompt(
    session: &MatchSession,
    registry: &PlayerRegistry,
    now: DateTime<Utc>,
) -> (String, Vec<Choice>) {
    let mut text = format!(
        "Match #{} [{}]\n{}\n{}\n",
        session.id,
        session.mode,
        roster_block(session, Side::Ct, registry),
        roster_block(session, Side::T, registry)
    );

    if let Some(map) = session.final_map() {
        let _ = write!(
            text,
            "\n🗺 Map: {}\nBanned: {}\n\nReady to play. Report the winner with /win {} ct|t",
            map,
            session.banned_maps.join(", "),
            session.id
        );
        return (text, Vec::new());
    }

    let captain = profile_of(registry, session.turn);
    let side = session.turn_side();
    let simulated = session.awaits_simulated_captain();

    let choices = match session.phase {
        Phase::Picking => {
            let _ = write!(
                text,
                "\nTurn: {} {} picks ({} s left)",
                side_marker(side),
                captain.display_name,
                session.pick_seconds_left(now)
            );
            if simulated {
                Vec::new()
            } else {
                pick_choices(session, registry)
            }
        }
        Phase::Banning => {
            let _ = write!(
                text,
                "\nMaps left: {}\nTurn: {} {} bans a map",
                session.maps.join(", "),
                side_marker(side),
                captain.display_name
            );
            if simulated {
                Vec::new()
            } else {
                ban_choices(session)
            }
        }
    };

    if simulated {
        text.push_str("\n🤖 simulated captain is choosing...");
    }
    (text, choices)
}

pub fn pick_choices(session: &MatchSession, registry: &PlayerRegistry) -> Vec<Choice> {
    session
        .pool
        .iter()
        .map(|id| {
            let p = profile_of(registry, *id);
            Choice::new(
                format!(
                    "{} {} [{}] | {}",
                    p.rank_icon(),
                    p.display_name,
                    external_or_placeholder(&p),
                    win_rate_text(&p)
                ),
                pick_token(session.id, *id),
            )
        })
        .collect()
}

pub fn ban_choices(session: &MatchSession) -> Vec<Choice> {
    session
        .maps
        .iter()
        .map(|map| Choice::new(format!("🚫 {}", map), ban_token(session.id, map)))
        .collect()
}

/// One line describing an applied pick or ban
pub fn draft_event(match_id: MatchId, event: &DraftEvent, registry: &PlayerRegistry) -> String {
    match event {
        DraftEvent::Picked(outcome) => {
            let mut text = format!(
                "#{} {} picked {}",
                match_id,
                side_marker(outcome.side),
                registry.display_name(outcome.chosen)
            );
            if let Some((last, side)) = outcome.auto_assigned {
                let _ = write!(
                    text,
                    "\n{} goes to {}",
                    registry.display_name(last),
                    side_marker(side)
                );
            }
            if outcome.pick_phase_complete {
                text.push_str("\nTeams are set, map bans begin");
            }
            text
        }
        DraftEvent::Banned(outcome) => {
            let mut text = format!(
                "#{} {} banned {}",
                match_id,
                side_marker(outcome.side),
                outcome.map
            );
            if let Some(map) = &outcome.final_map {
                let _ = write!(text, "\nFinal map: {}", map);
            }
            text
        }
    }
}

pub fn pick_timeout(match_id: MatchId) -> String {
    format!("⏰ Pick time ran out, match #{} was cancelled", match_id)
}

pub fn match_result(result: &MatchResult, registry: &PlayerRegistry) -> String {
    let names = |ids: &[PlayerId]| -> String {
        ids.iter()
            .map(|id| registry.display_name(*id))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut text = format!(
        "✅ Match #{} [{}] closed\n\n🏆 {} wins",
        result.match_id, result.mode, result.winner
    );
    if let Some(map) = &result.final_map {
        let _ = write!(text, " on {}", map);
    }
    let _ = write!(
        text,
        "\nWinners: {}\nLosers: {}",
        names(&result.winners),
        names(&result.losers)
    );
    for change in &result.changes {
        let _ = write!(
            text,
            "\n  {} {} → {}",
            registry.display_name(change.player_id),
            change.old_rating,
            change.new_rating
        );
    }
    text
}

/// Ranked listing. `total` is the number of ranked players beyond the page.
pub fn leaderboard(title: &str, profiles: &[PlayerProfile], total: usize) -> String {
    if profiles.is_empty() {
        return "🏆 The leaderboard is empty".to_string();
    }
    let mut text = format!("🏆 {}\n{}", title, RULE);
    for (i, p) in profiles.iter().enumerate() {
        let place = MEDALS
            .get(i)
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("{}.", i + 1));
        let _ = write!(
            text,
            "\n{} {} {} [{}]\n    Rating: {} | WR: {} | Games: {}",
            place,
            p.rank_icon(),
            p.display_name,
            p.external_id,
            p.rating,
            win_rate_text(p),
            p.games_played()
        );
    }
    if total > profiles.len() {
        let _ = write!(text, "\n\n... and {} more", total - profiles.len());
    }
    text
}

pub fn stats(profile: &PlayerProfile) -> String {
    format!(
        "✦ {} ✦\nID: {}\n{}\n{} {} rating\n🏆 Wins: {}  💀 Losses: {}\n📈 Win rate: {}  🎮 Games: {}\n{}",
        profile.display_name,
        external_or_placeholder(profile),
        RULE,
        profile.rank_icon(),
        profile.rating,
        profile.wins,
        profile.losses,
        win_rate_text(profile),
        profile.games_played(),
        RULE
    )
}

pub fn sessions(rows: &[SessionSummary], registry: &PlayerRegistry) -> String {
    if rows.is_empty() {
        return "No active matches".to_string();
    }
    let mut text = format!("📋 Active matches ({})", rows.len());
    for row in rows {
        let state = if row.ready_for_result {
            "ready".to_string()
        } else {
            row.phase.to_string()
        };
        let _ = write!(
            text,
            "\n#{} [{}] {} vs {} | {} | pool: {}",
            row.id,
            row.mode,
            registry.display_name(row.ct_captain),
            registry.display_name(row.t_captain),
            state,
            row.pool_size
        );
    }
    text
}

pub fn restriction_applied(kind: RestrictionKind, target: PlayerId, until: DateTime<Utc>) -> String {
    match kind {
        RestrictionKind::Mute => format!("🔇 Player {} muted until {}", target, until.format("%Y-%m-%d %H:%M UTC")),
        RestrictionKind::Ban => format!("🚫 Player {} banned until {}", target, until.format("%Y-%m-%d %H:%M UTC")),
    }
}

pub fn restriction_lifted(kind: RestrictionKind, target: PlayerId, existed: bool) -> String {
    match (kind, existed) {
        (RestrictionKind::Mute, true) => format!("🔊 Mute lifted from {}", target),
        (RestrictionKind::Ban, true) => format!("✅ Ban lifted from {}", target),
        (_, false) => format!("Player {} had no active {}", target, kind),
    }
}

pub fn practice_started(mode: Mode, humans: usize, simulated: usize) -> String {
    format!(
        "🤖 Practice {} match starting\n👤 Players: {}\n🤖 Simulated: {}",
        mode, humans, simulated
    )
}

/// User-visible text for a failed command
pub fn error_reply(err: &anyhow::Error) -> String {
    match match_error(err) {
        Some(e) => format!("🚫 {}", e),
        None => "🚫 Something went wrong, please try again".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::draft::DEFAULT_MAPS;
    use crate::error::MatchError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn registry() -> PlayerRegistry {
        let registry = PlayerRegistry::new(1000);
        for id in 1..=4 {
            registry
                .register(id, &format!("ext{}", id), &format!("player{}", id))
                .unwrap();
        }
        registry
    }

    fn session() -> MatchSession {
        let maps: Vec<String> = DEFAULT_MAPS.iter().map(|m| m.to_string()).collect();
        MatchSession::start(
            MatchId(3),
            Mode::TwoVsTwo,
            vec![1, 2, 3, 4],
            &maps,
            60,
            0,
            Utc::now(),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap()
    }

    #[test]
    fn test_lobby_lists_members_in_order() {
        let registry = registry();
        let snapshot = QueueSnapshot {
            mode: Mode::TwoVsTwo,
            capacity: 4,
            members: vec![2, 1],
        };
        let text = lobby(&snapshot, &registry);
        assert!(text.contains("2/4"));
        let first = text.find("player2").unwrap();
        let second = text.find("player1").unwrap();
        assert!(first < second);

        assert_eq!(lobby_choices(Mode::TwoVsTwo, false)[0].token, "join_2v2");
        assert_eq!(lobby_choices(Mode::TwoVsTwo, true)[0].token, "leave_2v2");
    }

    #[test]
    fn test_pick_prompt_offers_pool() {
        let registry = registry();
        let session = session();
        let (text, choices) = draft_prompt(&session, &registry, Utc::now());

        assert!(text.contains("picks"));
        assert_eq!(choices.len(), 2);
        for (choice, id) in choices.iter().zip(&session.pool) {
            assert_eq!(choice.token, format!("pk_3_{}", id));
        }
    }

    #[test]
    fn test_ban_prompt_and_ready_state() {
        let registry = registry();
        let mut session = session();
        let now = Utc::now();
        let chosen = session.pool[0];
        session.pick(session.ct_captain, chosen, now).unwrap();

        let (_, choices) = draft_prompt(&session, &registry, now);
        assert_eq!(choices.len(), 7);
        assert_eq!(choices[0].token, "bn_3_Dust2");

        while session.maps.len() > 1 {
            let map = session.maps[0].clone();
            session.ban(session.turn, &map).unwrap();
        }
        let (text, choices) = draft_prompt(&session, &registry, now);
        assert!(choices.is_empty());
        assert!(text.contains("/win 3 ct|t"));
    }

    #[test]
    fn test_leaderboard_overflow_line() {
        let registry = registry();
        let top = registry.leaderboard(2).unwrap();
        let text = leaderboard("Top players", &top, 4);
        assert!(text.contains("🥇"));
        assert!(text.contains("... and 2 more"));
        assert_eq!(leaderboard("Top", &[], 0), "🏆 The leaderboard is empty");
    }

    #[test]
    fn test_error_reply_uses_error_text() {
        let err: anyhow::Error = MatchError::NotInQueue {
            player_id: 9,
            mode: "2v2".to_string(),
        }
        .into();
        assert_eq!(error_reply(&err), "🚫 Player 9 is not in the 2v2 queue");
        assert!(error_reply(&anyhow::anyhow!("io")).contains("went wrong"));
    }
}
