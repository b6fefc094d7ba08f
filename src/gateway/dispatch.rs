//! Routes parsed commands to the matchmaker and renders the reply

use crate::error::{match_error, Result};
use crate::gateway::commands::{self, join_token, Command};
use crate::gateway::notifier::{Choice, Notice};
use crate::gateway::render;
use crate::queue::JoinOutcome;
use crate::service::matchmaker::Matchmaker;
use crate::types::{is_simulated_id, ChannelId, PlayerId, RestrictionKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows shown by `/top`
pub const TOP_LIMIT: usize = 10;
/// Rows shown by the administrative `/elo` table
pub const RATING_TABLE_LIMIT: usize = 30;

pub struct Dispatcher {
    matchmaker: Arc<Matchmaker>,
}

impl Dispatcher {
    pub fn new(matchmaker: Arc<Matchmaker>) -> Self {
        Self { matchmaker }
    }

    pub fn matchmaker(&self) -> &Arc<Matchmaker> {
        &self.matchmaker
    }

    /// Handle one inbound command or choice token from `actor`.
    ///
    /// Never fails: errors become a reply notice on `channel`.
    pub async fn handle(&self, actor: PlayerId, channel: ChannelId, input: &str) -> Notice {
        let metrics = self.matchmaker.metrics();

        let command = match commands::parse(input) {
            Ok(command) => command,
            Err(e) => {
                debug!("Unparseable input from {}: {:?} ({})", actor, input, e);
                metrics.record_command("unknown", "validation");
                return Notice::new(channel, render::error_reply(&e));
            }
        };

        let name = command.name();
        debug!("{} from {} on channel {}", name, actor, channel);

        match self.execute(actor, channel, command).await {
            Ok(notice) => {
                metrics.record_command(name, "ok");
                notice
            }
            Err(e) => {
                let kind = match_error(&e).map(|m| m.kind()).unwrap_or("internal");
                if kind == "internal" || kind == "persistence" {
                    warn!("{} from {} failed: {:#}", name, actor, e);
                } else {
                    debug!("{} from {} rejected: {}", name, actor, e);
                }
                metrics.record_command(name, kind);
                Notice::new(channel, render::error_reply(&e))
            }
        }
    }

    async fn execute(&self, actor: PlayerId, channel: ChannelId, command: Command) -> Result<Notice> {
        let mm = &self.matchmaker;
        let reply = |text: String| Notice::new(channel, text);

        let notice = match command {
            Command::Start => {
                let profile = mm.profile(actor)?;
                let shown = (profile.is_registered() || mm.is_admin(actor)).then_some(&profile);
                reply(render::welcome(shown))
            }
            Command::Register {
                external_id,
                display_name,
            } => {
                let profile = mm.register(actor, &external_id, &display_name).await?;
                reply(render::registered(&profile))
            }
            Command::Stats { target } => {
                if target.is_some_and(is_simulated_id) {
                    reply("🤖 Simulated players have no statistics".to_string())
                } else {
                    reply(render::stats(&mm.stats(actor, target)?))
                }
            }
            Command::Top => {
                let (rows, total) = mm.leaderboard(actor, TOP_LIMIT)?;
                reply(render::leaderboard("🏆 Top 10 players", &rows, total))
            }
            Command::Lobby(mode) => {
                let (snapshot, queued) = mm.lobby(actor, mode)?;
                reply(render::lobby(&snapshot, mm.registry()))
                    .with_choices(render::lobby_choices(mode, queued))
            }
            Command::QueueStatus => reply(render::queue_status(&mm.queue_status(actor)?)),
            Command::Join(mode) => match mm.join_queue(actor, mode, channel).await? {
                JoinOutcome::Queued { .. } => {
                    let snapshot = mm.queues().snapshot(mode)?;
                    reply(render::lobby(&snapshot, mm.registry()))
                        .with_choices(render::lobby_choices(mode, true))
                }
                JoinOutcome::Filled { roster, .. } => reply(format!(
                    "✅ The {} queue is full, starting a match with {} players",
                    mode,
                    roster.len()
                )),
            },
            Command::Leave(mode) => {
                let remaining = mm.leave_queue(actor, mode).await?;
                reply(render::queue_left(mode, remaining))
                    .with_choices(vec![Choice::new("Join again", join_token(mode))])
            }
            Command::Pick { match_id, player } => {
                let outcome = mm.pick(actor, match_id, player).await?;
                reply(format!(
                    "✅ You picked {}",
                    mm.registry().display_name(outcome.chosen)
                ))
            }
            Command::Ban { match_id, map } => {
                let outcome = mm.ban(actor, match_id, &map).await?;
                reply(format!("✅ You banned {}", outcome.map))
            }
            Command::RecordResult { match_id, winner } => {
                let result = mm.record_result(actor, match_id, winner).await?;
                reply(format!(
                    "✅ Match #{} recorded: {} wins, {} ratings changed",
                    result.match_id,
                    result.winner,
                    result.changes.len()
                ))
            }
            Command::Mute { target, span } => {
                let until = mm.restrict(actor, target, RestrictionKind::Mute, span).await?;
                reply(render::restriction_applied(RestrictionKind::Mute, target, until))
            }
            Command::Unmute { target } => {
                let existed = mm.lift(actor, target, RestrictionKind::Mute).await?;
                reply(render::restriction_lifted(RestrictionKind::Mute, target, existed))
            }
            Command::BanPlayer { target, span } => {
                let until = mm.restrict(actor, target, RestrictionKind::Ban, span).await?;
                reply(render::restriction_applied(RestrictionKind::Ban, target, until))
            }
            Command::Unban { target } => {
                let existed = mm.lift(actor, target, RestrictionKind::Ban).await?;
                reply(render::restriction_lifted(RestrictionKind::Ban, target, existed))
            }
            Command::RatingTable => {
                let (rows, total) = mm.rating_table(actor, RATING_TABLE_LIMIT)?;
                reply(render::leaderboard("📊 Rating table", &rows, total))
            }
            Command::SetRating { target, value } => {
                let change = mm.set_rating(actor, target, value).await?;
                reply(format!(
                    "✅ Rating of {}: {} → {}",
                    mm.registry().display_name(target),
                    change.old_rating,
                    change.new_rating
                ))
            }
            Command::ClearQueue(mode) => {
                let removed = mm.clear_queue(actor, mode).await?;
                let which = mode.map_or("All queues".to_string(), |m| format!("The {} queue", m));
                reply(format!(
                    "🗑 {} cleared, {} players removed",
                    which,
                    removed.len()
                ))
            }
            Command::Matches => {
                let rows = mm.list_sessions(actor).await?;
                reply(render::sessions(&rows, mm.registry()))
            }
            Command::Practice(mode) => {
                let id = mm.start_practice(actor, mode, channel).await?;
                let simulated = mm.config().queue.capacity(mode).saturating_sub(1);
                reply(format!(
                    "{}\nMatch #{}",
                    render::practice_started(mode, 1, simulated),
                    id
                ))
            }
            Command::Simulate(mode) => {
                let id = mm.start_simulated(actor, mode, channel).await?;
                let simulated = mm.config().queue.capacity(mode);
                reply(format!(
                    "{}\nMatch #{}",
                    render::practice_started(mode, 0, simulated),
                    id
                ))
            }
        };

        Ok(notice)
    }
}
