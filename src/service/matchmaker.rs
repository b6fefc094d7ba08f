//! The matchmaking core
//!
//! [`Matchmaker`] owns every aggregate (players, moderation, queues, sessions)
//! and exposes the actor-facing operations. Each aggregate has its own lock;
//! draft actions on one match are serialized by that match's session mutex,
//! whether they come from a human captain or from autoplay.
//!
//! Operations that start matches or hand a turn to a simulated captain take
//! `self: &Arc<Self>` so they can spawn the autoplay loop.

use crate::bot::{AutoplayScheduler, AutoplayStep, RandomRosterProvider, RosterProvider, SimulatedTurnDriver};
use crate::config::AppConfig;
use crate::draft::{
    BanOutcome, DraftChoice, DraftEvent, MatchSession, PickOutcome, SessionHandle, SessionSummary,
    SessionTable,
};
use crate::error::{match_error, MatchError, Result};
use crate::gateway::notifier::{Notice, Notifier};
use crate::gateway::render;
use crate::metrics::{ActionSource, MatchOrigin, MetricsCollector};
use crate::moderation::{AccessGate, GatedAction, ModerationLedger, RestrictionSpan};
use crate::players::PlayerRegistry;
use crate::queue::{JoinOutcome, QueueManager, QueueSnapshot};
use crate::rating::{FixedDeltaCalculator, MatchResult, RatingLedger};
use crate::storage::{SnapshotStore, StateDocument};
use crate::types::{
    ChannelId, MatchId, Mode, PlayerId, PlayerProfile, RatingChange, RestrictionKind, Side,
};
use crate::utils::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::MutexGuard;
use tracing::{debug, error, info, warn};

/// Display name given to profiles first seen in a roster
const DEFAULT_DISPLAY_NAME: &str = "Player";

pub struct Matchmaker {
    config: AppConfig,
    registry: Arc<PlayerRegistry>,
    moderation: ModerationLedger,
    gate: AccessGate,
    queues: QueueManager,
    sessions: SessionTable,
    ratings: RatingLedger,
    roster: Arc<dyn RosterProvider>,
    autoplay: AutoplayScheduler,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn SnapshotStore>,
    metrics: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    save_lock: tokio::sync::Mutex<()>,
    started_at: Instant,
}

impl Matchmaker {
    pub fn new(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn SnapshotStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let registry = Arc::new(PlayerRegistry::new(config.rating.initial_rating));
        let calculator = Arc::new(FixedDeltaCalculator::new(&config.rating));

        Self {
            gate: AccessGate::new(config.service.admin_ids.iter().copied()),
            queues: QueueManager::new(&config.queue),
            ratings: RatingLedger::new(registry.clone(), calculator),
            autoplay: AutoplayScheduler::new(&config.draft),
            registry,
            moderation: ModerationLedger::new(),
            sessions: SessionTable::new(),
            roster: Arc::new(RandomRosterProvider::new()),
            notifier,
            store,
            metrics,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_entropy()),
            save_lock: tokio::sync::Mutex::new(()),
            started_at: Instant::now(),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_roster_provider(mut self, roster: Arc<dyn RosterProvider>) -> Self {
        self.roster = roster;
        self
    }

    /// Fix the shuffle and autoplay choices for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn moderation(&self) -> &ModerationLedger {
        &self.moderation
    }

    pub fn queues(&self) -> &QueueManager {
        &self.queues
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn autoplay(&self) -> &AutoplayScheduler {
        &self.autoplay
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_admin(&self, id: PlayerId) -> bool {
        self.gate.is_admin(id)
    }

    /// Run the access gate for `actor`
    pub fn check_access(&self, actor: PlayerId, action: GatedAction) -> Result<()> {
        self.gate
            .check(actor, action, &self.registry, &self.moderation, self.now())
    }

    async fn notify(&self, notice: Notice) {
        let channel = notice.channel;
        if let Err(e) = self.notifier.deliver(notice).await {
            warn!("Failed to deliver notice to channel {}: {}", channel, e);
        }
    }

    // ------------------------------------------------------------------
    // Players

    /// Profile of `actor`, created on first reference
    pub fn profile(&self, actor: PlayerId) -> Result<PlayerProfile> {
        self.registry.get_or_create(actor, DEFAULT_DISPLAY_NAME)
    }

    pub async fn register(
        &self,
        actor: PlayerId,
        external_id: &str,
        display_name: &str,
    ) -> Result<PlayerProfile> {
        self.check_access(actor, GatedAction::Register)?;
        let profile = self.registry.register(actor, external_id, display_name)?;
        self.persist().await;
        Ok(profile)
    }

    /// Public statistics of `target`, or of the actor
    pub fn stats(&self, actor: PlayerId, target: Option<PlayerId>) -> Result<PlayerProfile> {
        self.check_access(actor, GatedAction::Play)?;
        self.registry.stats(target.unwrap_or(actor))
    }

    /// Top `limit` ranked players and the total number ranked
    pub fn leaderboard(&self, actor: PlayerId, limit: usize) -> Result<(Vec<PlayerProfile>, usize)> {
        self.check_access(actor, GatedAction::Play)?;
        Ok((
            self.registry.leaderboard(limit)?,
            self.registry.ranked_count()?,
        ))
    }

    /// Administrative rating table
    pub fn rating_table(&self, actor: PlayerId, limit: usize) -> Result<(Vec<PlayerProfile>, usize)> {
        self.gate.require_admin(actor)?;
        Ok((
            self.registry.leaderboard(limit)?,
            self.registry.ranked_count()?,
        ))
    }

    pub async fn set_rating(
        &self,
        actor: PlayerId,
        target: PlayerId,
        value: i32,
    ) -> Result<RatingChange> {
        self.gate.require_admin(actor)?;
        let change = self.ratings.set_rating(target, value)?;
        self.persist().await;
        Ok(change)
    }

    // ------------------------------------------------------------------
    // Moderation

    pub async fn restrict(
        &self,
        actor: PlayerId,
        target: PlayerId,
        kind: RestrictionKind,
        span: RestrictionSpan,
    ) -> Result<DateTime<Utc>> {
        self.gate.require_admin(actor)?;
        let until = self.moderation.restrict(target, kind, span, self.now())?;
        self.persist().await;
        Ok(until)
    }

    /// Remove a restriction. Returns whether one was stored.
    pub async fn lift(&self, actor: PlayerId, target: PlayerId, kind: RestrictionKind) -> Result<bool> {
        self.gate.require_admin(actor)?;
        let removed = self.moderation.lift(target, kind)?;
        if removed {
            self.persist().await;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Queues

    /// Current lobby for `mode` and whether the actor is in it
    pub fn lobby(&self, actor: PlayerId, mode: Mode) -> Result<(QueueSnapshot, bool)> {
        self.check_access(actor, GatedAction::JoinQueue)?;
        let snapshot = self.queues.snapshot(mode)?;
        let queued = snapshot.members.contains(&actor);
        Ok((snapshot, queued))
    }

    pub fn queue_status(&self, actor: PlayerId) -> Result<Vec<QueueSnapshot>> {
        self.check_access(actor, GatedAction::Play)?;
        self.queues.status()
    }

    /// Join `mode`'s queue. A join that fills the queue starts the match and
    /// reports its match id through `channel`.
    pub async fn join_queue(
        self: &Arc<Self>,
        actor: PlayerId,
        mode: Mode,
        channel: ChannelId,
    ) -> Result<JoinOutcome> {
        self.check_access(actor, GatedAction::JoinQueue)?;
        let timer = self.metrics.start_timer();

        let outcome = self.queues.join(actor, mode)?;
        match &outcome {
            JoinOutcome::Queued { size, .. } => {
                self.metrics.record_queue_join(mode, *size);
            }
            JoinOutcome::Filled { roster, .. } => {
                self.metrics.record_queue_fill(mode);
                if let Err(e) = self
                    .start_match(mode, roster.clone(), channel, MatchOrigin::Queue)
                    .await
                {
                    error!("Failed to start {} match from a full queue: {}", mode, e);
                    return Err(e);
                }
            }
        }

        self.metrics.record_operation("join", timer.stop());
        self.persist().await;
        Ok(outcome)
    }

    /// Leave `mode`'s queue. Returns the remaining size.
    pub async fn leave_queue(&self, actor: PlayerId, mode: Mode) -> Result<usize> {
        self.check_access(actor, GatedAction::Play)?;
        let remaining = self.queues.leave(actor, mode)?;
        self.metrics.record_queue_leave(mode, remaining);
        self.persist().await;
        Ok(remaining)
    }

    /// Empty one or both queues. Profiles are kept.
    pub async fn clear_queue(&self, actor: PlayerId, mode: Option<Mode>) -> Result<Vec<PlayerId>> {
        self.gate.require_admin(actor)?;
        let removed = self.queues.clear(mode)?;
        for m in Mode::ALL {
            if mode.is_none() || mode == Some(m) {
                self.metrics.set_queue_size(m, 0);
            }
        }
        self.persist().await;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Matches

    async fn start_match(
        self: &Arc<Self>,
        mode: Mode,
        roster: Vec<PlayerId>,
        channel: ChannelId,
        origin: MatchOrigin,
    ) -> Result<MatchId> {
        for id in &roster {
            self.registry.get_or_create(*id, DEFAULT_DISPLAY_NAME)?;
        }

        let id = self.sessions.next_id();
        let now = self.now();
        let session = {
            let mut rng = self.rng.lock().map_err(|_| MatchError::lock("rng"))?;
            MatchSession::start(
                id,
                mode,
                roster,
                &self.config.draft.maps,
                self.config.draft.pick_timeout_seconds,
                channel,
                now,
                &mut *rng,
            )?
        };

        let intro = render::match_started(&session, &self.registry);
        let (prompt, choices) = render::draft_prompt(&session, &self.registry, now);
        let simulated_turn = session.awaits_simulated_captain();

        info!(
            "Match {} [{}] started: CT captain {}, T captain {}, {} in pool",
            id,
            mode,
            session.ct_captain,
            session.t_captain,
            session.pool.len()
        );
        self.sessions.insert(session)?;
        self.metrics.record_match_started(mode, origin);

        self.notify(Notice::new(channel, format!("{}\n\n{}", intro, prompt)).with_choices(choices))
            .await;

        if simulated_turn {
            self.schedule_autoplay(id);
        }
        Ok(id)
    }

    fn schedule_autoplay(self: &Arc<Self>, match_id: MatchId) {
        let driver: Arc<dyn SimulatedTurnDriver> = self.clone();
        debug!("Scheduling autoplay for match {}", match_id);
        self.autoplay.schedule(driver, match_id);
    }

    /// Fails with `SessionNotFound` when `handle` was detached while waiting
    /// for its lock
    fn ensure_attached(&self, match_id: MatchId, handle: &SessionHandle) -> Result<()> {
        let current = self.sessions.get(match_id)?;
        if Arc::ptr_eq(&current, handle) {
            Ok(())
        } else {
            Err(MatchError::SessionNotFound {
                match_id: match_id.to_string(),
            }
            .into())
        }
    }

    /// Apply one pick or ban under the session lock and broadcast it.
    ///
    /// Returns the event and whether the next turn belongs to a simulated
    /// captain. A detected pick timeout removes the session before the error
    /// is returned.
    async fn apply_locked(
        &self,
        match_id: MatchId,
        handle: &SessionHandle,
        mut session: MutexGuard<'_, MatchSession>,
        actor: PlayerId,
        choice: DraftChoice,
        source: ActionSource,
    ) -> Result<(DraftEvent, bool)> {
        let now = self.now();
        let applied = match choice {
            DraftChoice::Pick(chosen) => session.pick(actor, chosen, now).map(DraftEvent::Picked),
            DraftChoice::Ban(map) => session.ban(actor, &map).map(DraftEvent::Banned),
        };

        let event = match applied {
            Ok(event) => event,
            Err(err) => {
                // Name the captain holding the turn rather than the side
                let err = if matches!(match_error(&err), Some(MatchError::InvalidTurn { .. })) {
                    MatchError::InvalidTurn {
                        whose: self.registry.display_name(session.turn),
                    }
                    .into()
                } else {
                    err
                };
                match match_error(&err) {
                    Some(MatchError::Timeout { .. }) => {
                        let channel = session.channel;
                        if self.sessions.remove_handle(match_id, handle)? {
                            warn!("Match {} cancelled: pick time expired", match_id);
                            self.metrics.record_pick_timeout();
                            self.notify(Notice::new(channel, render::pick_timeout(match_id)))
                                .await;
                        }
                        drop(session);
                        self.persist().await;
                    }
                    Some(e) => {
                        debug!("Match {}: {} rejected: {}", match_id, actor, e);
                        self.metrics.record_rejected_action(e.kind());
                    }
                    None => self.metrics.record_rejected_action("internal"),
                }
                return Err(err);
            }
        };

        info!(
            "Match {}: {} by {} ({:?})",
            match_id,
            event.kind(),
            actor,
            source
        );
        self.metrics.record_draft_action(event.kind(), source);

        let summary = render::draft_event(match_id, &event, &self.registry);
        let (prompt, choices) = render::draft_prompt(&session, &self.registry, now);
        let next_simulated = session.awaits_simulated_captain();
        self.notify(
            Notice::new(session.channel, format!("{}\n\n{}", summary, prompt)).with_choices(choices),
        )
        .await;
        drop(session);

        self.persist().await;
        Ok((event, next_simulated))
    }

    async fn human_action(
        self: &Arc<Self>,
        actor: PlayerId,
        match_id: MatchId,
        choice: DraftChoice,
    ) -> Result<DraftEvent> {
        self.check_access(actor, GatedAction::Play)?;
        let handle = self.sessions.get(match_id)?;
        let session = handle.lock().await;
        self.ensure_attached(match_id, &handle)?;

        let (event, next_simulated) = self
            .apply_locked(match_id, &handle, session, actor, choice, ActionSource::Human)
            .await?;
        if next_simulated {
            self.schedule_autoplay(match_id);
        }
        Ok(event)
    }

    /// A captain drafts `chosen` from the pool
    pub async fn pick(
        self: &Arc<Self>,
        actor: PlayerId,
        match_id: MatchId,
        chosen: PlayerId,
    ) -> Result<PickOutcome> {
        match self
            .human_action(actor, match_id, DraftChoice::Pick(chosen))
            .await?
        {
            DraftEvent::Picked(outcome) => Ok(outcome),
            DraftEvent::Banned(_) => Err(MatchError::InternalError {
                message: "pick produced a ban".to_string(),
            }
            .into()),
        }
    }

    /// A captain bans `map` from the remaining catalog
    pub async fn ban(
        self: &Arc<Self>,
        actor: PlayerId,
        match_id: MatchId,
        map: &str,
    ) -> Result<BanOutcome> {
        match self
            .human_action(actor, match_id, DraftChoice::Ban(map.to_string()))
            .await?
        {
            DraftEvent::Banned(outcome) => Ok(outcome),
            DraftEvent::Picked(_) => Err(MatchError::InternalError {
                message: "ban produced a pick".to_string(),
            }
            .into()),
        }
    }

    /// Close a match and rate its rosters. Any phase is accepted.
    pub async fn record_result(
        &self,
        actor: PlayerId,
        match_id: MatchId,
        winner: Side,
    ) -> Result<MatchResult> {
        self.gate.require_admin(actor)?;
        let timer = self.metrics.start_timer();

        let handle = self
            .sessions
            .remove(match_id)?
            .ok_or_else(|| MatchError::SessionNotFound {
                match_id: match_id.to_string(),
            })?;
        let session = handle.lock().await;
        let result = self.ratings.record(&session, winner)?;
        self.metrics.record_match_completed(result.mode);
        self.notify(Notice::new(
            session.channel,
            render::match_result(&result, &self.registry),
        ))
        .await;
        drop(session);

        self.metrics.record_operation("record_result", timer.stop());
        self.persist().await;
        Ok(result)
    }

    pub async fn list_sessions(&self, actor: PlayerId) -> Result<Vec<SessionSummary>> {
        self.gate.require_admin(actor)?;
        self.sessions.summaries().await
    }

    /// Practice match: the caller plus simulated players, bypassing the queues
    pub async fn start_practice(
        self: &Arc<Self>,
        actor: PlayerId,
        mode: Mode,
        channel: ChannelId,
    ) -> Result<MatchId> {
        self.gate.require_admin(actor)?;

        if let Some(left) = self.queues.remove_everywhere(actor)? {
            self.metrics
                .set_queue_size(left, self.queues.snapshot(left)?.size());
        }

        let capacity = self.config.queue.capacity(mode);
        let mut roster = vec![actor];
        roster.extend(self.allocate_simulated(capacity.saturating_sub(1))?);

        let id = self
            .start_match(mode, roster, channel, MatchOrigin::Practice)
            .await?;
        self.persist().await;
        Ok(id)
    }

    /// Practice match played entirely by simulated captains
    pub async fn start_simulated(
        self: &Arc<Self>,
        actor: PlayerId,
        mode: Mode,
        channel: ChannelId,
    ) -> Result<MatchId> {
        self.gate.require_admin(actor)?;

        let roster = self.allocate_simulated(self.config.queue.capacity(mode))?;
        let id = self
            .start_match(mode, roster, channel, MatchOrigin::Practice)
            .await?;
        self.persist().await;
        Ok(id)
    }

    fn allocate_simulated(&self, count: usize) -> Result<Vec<PlayerId>> {
        let profiles = self.roster.allocate(count)?;
        let ids = profiles.iter().map(|p| p.id).collect();
        for profile in profiles {
            self.registry.insert(profile)?;
        }
        Ok(ids)
    }

    /// Wait until every autoplay loop has finished
    pub async fn wait_for_autoplay(&self) -> usize {
        self.autoplay.wait_idle().await
    }

    // ------------------------------------------------------------------
    // Persistence

    pub async fn snapshot(&self) -> Result<StateDocument> {
        Ok(StateDocument {
            players: self.registry.snapshot()?,
            queues: self.queues.status()?,
            sessions: self.sessions.snapshot().await?,
            moderation: self.moderation.snapshot()?,
            match_counter: self.sessions.counter(),
            simulated_counter: self.roster.allocated(),
            saved_at: Some(self.now()),
            ..StateDocument::default()
        })
    }

    /// Write the current state to the store.
    ///
    /// Must not be called while holding a session lock.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let timer = self.metrics.start_timer();
        let result = match self.snapshot().await {
            Ok(document) => self.store.save(&document).await,
            Err(e) => Err(e),
        };
        self.metrics.record_snapshot(result.is_ok(), timer.stop());
        result
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            error!("Failed to save state: {}", e);
        }
    }

    /// Replace all state with a loaded document. Returns the number of
    /// sessions restored; invalid sessions are dropped with a warning.
    pub fn restore(&self, document: StateDocument) -> Result<usize> {
        self.registry.restore(document.players)?;
        self.moderation.restore(document.moderation)?;
        self.queues.restore(document.queues)?;

        let mut sessions = Vec::with_capacity(document.sessions.len());
        for session in document.sessions {
            match session.validate() {
                Ok(()) => sessions.push(session),
                Err(e) => warn!("Dropping restored match {}: {}", session.id, e),
            }
        }
        let restored = sessions.len();
        self.sessions.restore(sessions, document.match_counter)?;
        self.roster.restore_allocated(document.simulated_counter);

        self.metrics.set_active_sessions(restored);
        for snapshot in self.queues.status()? {
            self.metrics.set_queue_size(snapshot.mode, snapshot.size());
        }

        info!(
            "Restored {} players, {} matches, match counter {}",
            self.registry.len(),
            restored,
            self.sessions.counter()
        );
        Ok(restored)
    }

    /// Load the stored document if there is one.
    ///
    /// An unreadable document is logged and replaced by an empty one, unless
    /// `storage.reset_on_corrupt` is turned off, in which case it fails startup.
    pub async fn load_state(&self) -> Result<usize> {
        match self.store.load().await {
            Ok(Some(document)) => self.restore(document),
            Ok(None) => {
                info!("No saved state found, starting empty");
                Ok(0)
            }
            Err(e) if self.config.storage.reset_on_corrupt => {
                error!("Saved state is unreadable, starting empty: {:#}", e);
                self.metrics.record_state_reset();
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Restart autoplay for restored sessions waiting on a simulated captain
    pub async fn resume_autoplay(self: &Arc<Self>) -> Result<usize> {
        let mut resumed = 0;
        for (id, handle) in self.sessions.handles()? {
            let waiting = handle.lock().await.awaits_simulated_captain();
            if waiting {
                self.schedule_autoplay(id);
                resumed += 1;
            }
        }
        if resumed > 0 {
            info!("Resumed autoplay for {} restored matches", resumed);
        }
        Ok(resumed)
    }

    /// Stop autoplay and write a final snapshot
    pub async fn shutdown(&self) -> Result<()> {
        self.autoplay.abort_all();
        self.save().await
    }
}

#[async_trait]
impl SimulatedTurnDriver for Matchmaker {
    async fn play_simulated_turn(&self, match_id: MatchId) -> Result<AutoplayStep> {
        let handle = match self.sessions.get(match_id) {
            Ok(handle) => handle,
            Err(e) if matches!(match_error(&e), Some(MatchError::SessionNotFound { .. })) => {
                return Ok(AutoplayStep::Idle)
            }
            Err(e) => return Err(e),
        };

        let session = handle.lock().await;
        if self.ensure_attached(match_id, &handle).is_err() || !session.awaits_simulated_captain() {
            return Ok(AutoplayStep::Idle);
        }

        let choice = {
            let mut rng = self.rng.lock().map_err(|_| MatchError::lock("rng"))?;
            session.random_choice(&mut *rng)
        };
        let Some(choice) = choice else {
            return Ok(AutoplayStep::Idle);
        };
        let actor = session.turn;

        match self
            .apply_locked(match_id, &handle, session, actor, choice, ActionSource::Autoplay)
            .await
        {
            Ok((_, next_simulated)) => Ok(AutoplayStep::Acted { next_simulated }),
            Err(e) if matches!(match_error(&e), Some(MatchError::Timeout { .. })) => {
                Ok(AutoplayStep::Idle)
            }
            Err(e) => Err(e),
        }
    }
}
