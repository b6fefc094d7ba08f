//! Match session state machine
//!
//! A session starts in the pick phase with two captains and a pool of
//! undrafted players, moves to the ban phase once the pool is empty, and is
//! ready for a result when a single map remains. Termination is removal of
//! the session from the table; there is no closed state.

use crate::error::{MatchError, Result};
use crate::types::{is_simulated_id, ChannelId, MatchId, Mode, Phase, PlayerId, Side};
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a successful pick did
#[derive(Debug, Clone, PartialEq)]
pub struct PickOutcome {
    pub side: Side,
    pub chosen: PlayerId,
    /// The last pool member, assigned without consuming a turn
    pub auto_assigned: Option<(PlayerId, Side)>,
    /// The pool is empty and the ban phase has begun
    pub pick_phase_complete: bool,
}

/// What a successful ban did
#[derive(Debug, Clone, PartialEq)]
pub struct BanOutcome {
    pub side: Side,
    pub map: String,
    /// Set when only one map is left and the match awaits its result
    pub final_map: Option<String>,
}

/// Either kind of draft action, used for notifications and metrics
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEvent {
    Picked(PickOutcome),
    Banned(BanOutcome),
}

impl DraftEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DraftEvent::Picked(_) => "pick",
            DraftEvent::Banned(_) => "ban",
        }
    }
}

/// One in-progress or ready-for-result match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSession {
    pub id: MatchId,
    pub mode: Mode,
    pub ct_captain: PlayerId,
    pub t_captain: PlayerId,
    /// CT side, captain first
    pub ct_roster: Vec<PlayerId>,
    /// T side, captain first
    pub t_roster: Vec<PlayerId>,
    pub pool: Vec<PlayerId>,
    pub maps: Vec<String>,
    pub banned_maps: Vec<String>,
    pub turn: PlayerId,
    pub phase: Phase,
    pub pick_started_at: DateTime<Utc>,
    pub pick_timeout_seconds: u64,
    pub channel: ChannelId,
}

impl MatchSession {
    /// Start a session from a full roster.
    ///
    /// The roster is shuffled once; the first two entries become the CT and T
    /// captains and the rest form the pool. CT acts first.
    #[allow(clippy::too_many_arguments)]
    pub fn start<R: Rng + ?Sized>(
        id: MatchId,
        mode: Mode,
        mut roster: Vec<PlayerId>,
        catalog: &[String],
        pick_timeout_seconds: u64,
        channel: ChannelId,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Self> {
        if roster.len() < 4 || roster.len() % 2 != 0 {
            return Err(MatchError::ValidationError {
                reason: format!(
                    "A match needs an even roster of at least 4 players, got {}",
                    roster.len()
                ),
            }
            .into());
        }
        let unique: HashSet<PlayerId> = roster.iter().copied().collect();
        if unique.len() != roster.len() {
            return Err(MatchError::ValidationError {
                reason: "A match roster cannot contain the same player twice".to_string(),
            }
            .into());
        }
        if catalog.len() < 2 {
            return Err(MatchError::ValidationError {
                reason: "A match needs at least 2 maps".to_string(),
            }
            .into());
        }

        roster.shuffle(rng);
        let pool = roster.split_off(2);
        let (ct_captain, t_captain) = (roster[0], roster[1]);

        Ok(Self {
            id,
            mode,
            ct_captain,
            t_captain,
            ct_roster: vec![ct_captain],
            t_roster: vec![t_captain],
            pool,
            maps: catalog.to_vec(),
            banned_maps: Vec::new(),
            turn: ct_captain,
            phase: Phase::Picking,
            pick_started_at: now,
            pick_timeout_seconds,
            channel,
        })
    }

    pub fn captain(&self, side: Side) -> PlayerId {
        match side {
            Side::Ct => self.ct_captain,
            Side::T => self.t_captain,
        }
    }

    /// Side a captain leads, `None` for everyone else
    pub fn captain_side(&self, actor: PlayerId) -> Option<Side> {
        if actor == self.ct_captain {
            Some(Side::Ct)
        } else if actor == self.t_captain {
            Some(Side::T)
        } else {
            None
        }
    }

    pub fn turn_side(&self) -> Side {
        if self.turn == self.ct_captain {
            Side::Ct
        } else {
            Side::T
        }
    }

    pub fn roster(&self, side: Side) -> &[PlayerId] {
        match side {
            Side::Ct => &self.ct_roster,
            Side::T => &self.t_roster,
        }
    }

    fn roster_mut(&mut self, side: Side) -> &mut Vec<PlayerId> {
        match side {
            Side::Ct => &mut self.ct_roster,
            Side::T => &mut self.t_roster,
        }
    }

    /// Every player in the match: CT roster, T roster, then the pool
    pub fn participants(&self) -> Vec<PlayerId> {
        self.ct_roster
            .iter()
            .chain(&self.t_roster)
            .chain(&self.pool)
            .copied()
            .collect()
    }

    pub fn is_ready_for_result(&self) -> bool {
        self.phase == Phase::Banning && self.maps.len() == 1
    }

    pub fn final_map(&self) -> Option<&str> {
        if self.is_ready_for_result() {
            self.maps.first().map(String::as_str)
        } else {
            None
        }
    }

    /// True when the next action belongs to a simulated captain
    pub fn awaits_simulated_captain(&self) -> bool {
        is_simulated_id(self.turn) && !self.is_ready_for_result()
    }

    pub fn pick_deadline(&self) -> DateTime<Utc> {
        self.pick_started_at + Duration::seconds(self.pick_timeout_seconds as i64)
    }

    pub fn pick_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.pick_deadline()
    }

    /// Whole seconds left in the pick phase, never negative
    pub fn pick_seconds_left(&self, now: DateTime<Utc>) -> i64 {
        (self.pick_deadline() - now).num_seconds().max(0)
    }

    fn ensure_captain(&self, actor: PlayerId, what: &str) -> Result<Side> {
        self.captain_side(actor).ok_or_else(|| {
            MatchError::PermissionDenied {
                reason: format!("only a captain can {}", what),
            }
            .into()
        })
    }

    fn ensure_turn(&self, actor: PlayerId) -> Result<()> {
        if actor != self.turn {
            return Err(MatchError::InvalidTurn {
                whose: format!("the {} captain", self.turn_side()),
            }
            .into());
        }
        Ok(())
    }

    /// Draft `chosen` onto the acting captain's side.
    ///
    /// Checks run in order: captain, pick phase, turn, deadline, pool
    /// membership. A `Timeout` error means the session must be discarded.
    pub fn pick(
        &mut self,
        actor: PlayerId,
        chosen: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<PickOutcome> {
        let side = self.ensure_captain(actor, "pick players")?;
        if self.phase != Phase::Picking {
            return Err(MatchError::InvalidChoice {
                reason: "the pick phase is over".to_string(),
            }
            .into());
        }
        self.ensure_turn(actor)?;
        if self.pick_expired(now) {
            return Err(MatchError::Timeout {
                match_id: self.id.to_string(),
            }
            .into());
        }
        let Some(index) = self.pool.iter().position(|p| *p == chosen) else {
            return Err(MatchError::InvalidChoice {
                reason: format!("player {} is not in the pool", chosen),
            }
            .into());
        };

        self.pool.remove(index);
        self.roster_mut(side).push(chosen);

        let auto_assigned = if self.pool.len() == 1 {
            let last = self.pool.remove(0);
            let smaller = if self.ct_roster.len() <= self.t_roster.len() {
                Side::Ct
            } else {
                Side::T
            };
            self.roster_mut(smaller).push(last);
            Some((last, smaller))
        } else {
            None
        };

        let pick_phase_complete = self.pool.is_empty();
        if pick_phase_complete {
            self.phase = Phase::Banning;
            self.turn = self.ct_captain;
        } else {
            self.turn = self.captain(side.opponent());
        }

        Ok(PickOutcome {
            side,
            chosen,
            auto_assigned,
            pick_phase_complete,
        })
    }

    /// Remove `map` from the remaining pool.
    ///
    /// Map names match case-insensitively. When one map remains the turn is
    /// left as is and further bans are rejected.
    pub fn ban(&mut self, actor: PlayerId, map: &str) -> Result<BanOutcome> {
        let side = self.ensure_captain(actor, "ban maps")?;
        if self.phase != Phase::Banning {
            return Err(MatchError::InvalidChoice {
                reason: "maps are banned after the pick phase".to_string(),
            }
            .into());
        }
        if self.is_ready_for_result() {
            return Err(MatchError::InvalidChoice {
                reason: "the map is already decided".to_string(),
            }
            .into());
        }
        self.ensure_turn(actor)?;
        let Some(index) = self
            .maps
            .iter()
            .position(|m| m.eq_ignore_ascii_case(map))
        else {
            return Err(MatchError::InvalidChoice {
                reason: format!("{} is not available", map),
            }
            .into());
        };

        let banned = self.maps.remove(index);
        self.banned_maps.push(banned.clone());

        let final_map = if self.maps.len() == 1 {
            self.maps.first().cloned()
        } else {
            self.turn = self.captain(side.opponent());
            None
        };

        Ok(BanOutcome {
            side,
            map: banned,
            final_map,
        })
    }

    /// Uniformly random legal action for whoever holds the turn
    pub fn random_choice<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<DraftChoice> {
        if self.is_ready_for_result() {
            return None;
        }
        match self.phase {
            Phase::Picking => self.pool.choose(rng).copied().map(DraftChoice::Pick),
            Phase::Banning => self.maps.choose(rng).cloned().map(DraftChoice::Ban),
        }
    }

    /// Apply a choice on behalf of the current turn holder
    pub fn apply_for_turn(&mut self, choice: DraftChoice, now: DateTime<Utc>) -> Result<DraftEvent> {
        let actor = self.turn;
        match choice {
            DraftChoice::Pick(chosen) => self.pick(actor, chosen, now).map(DraftEvent::Picked),
            DraftChoice::Ban(map) => self.ban(actor, &map).map(DraftEvent::Banned),
        }
    }

    /// Check the structural invariants of a session, typically after restore
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| -> anyhow::Error {
            MatchError::ValidationError {
                reason: format!("match {}: {}", self.id, reason),
            }
            .into()
        };

        if self.ct_roster.first() != Some(&self.ct_captain)
            || self.t_roster.first() != Some(&self.t_captain)
        {
            return Err(invalid("captains must lead their rosters"));
        }
        if self.turn != self.ct_captain && self.turn != self.t_captain {
            return Err(invalid("turn must belong to a captain"));
        }
        let participants = self.participants();
        let unique: HashSet<PlayerId> = participants.iter().copied().collect();
        if unique.len() != participants.len() {
            return Err(invalid("rosters and pool overlap"));
        }
        if self.phase == Phase::Banning && !self.pool.is_empty() {
            return Err(invalid("ban phase with players left in the pool"));
        }
        if self.maps.is_empty() {
            return Err(invalid("no maps left"));
        }
        Ok(())
    }
}

/// A pick or ban decided by a simulated captain
#[derive(Debug, Clone, PartialEq)]
pub enum DraftChoice {
    Pick(PlayerId),
    Ban(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::draft::DEFAULT_MAPS;
    use crate::error::match_error;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn catalog() -> Vec<String> {
        DEFAULT_MAPS.iter().map(|m| m.to_string()).collect()
    }

    fn session(size: i64, now: DateTime<Utc>) -> MatchSession {
        let mut rng = StdRng::seed_from_u64(7);
        let mode = if size == 10 { Mode::FiveVsFive } else { Mode::TwoVsTwo };
        MatchSession::start(
            MatchId(1),
            mode,
            (1..=size).collect(),
            &catalog(),
            60,
            0,
            now,
            &mut rng,
        )
        .unwrap()
    }

    fn kind(err: anyhow::Error) -> &'static str {
        match_error(&err).unwrap().kind()
    }

    fn outsider(s: &MatchSession) -> PlayerId {
        s.pool[0]
    }

    #[test]
    fn test_start_layout() {
        let now = Utc::now();
        let s = session(10, now);
        assert_eq!(s.pool.len(), 8);
        assert_eq!(s.turn, s.ct_captain);
        assert_eq!(s.phase, Phase::Picking);
        assert_eq!(s.maps.len(), 7);
        assert!(s.banned_maps.is_empty());
        assert_ne!(s.ct_captain, s.t_captain);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_start_rejects_odd_or_duplicate_roster() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let odd = MatchSession::start(MatchId(1), Mode::TwoVsTwo, vec![1, 2, 3], &catalog(), 60, 0, now, &mut rng);
        assert!(odd.is_err());
        let dup = MatchSession::start(MatchId(1), Mode::TwoVsTwo, vec![1, 2, 3, 3], &catalog(), 60, 0, now, &mut rng);
        assert!(dup.is_err());
    }

    #[test]
    fn test_full_five_vs_five_draft() {
        let now = Utc::now();
        let mut s = session(10, now);

        let mut picks = 0;
        while s.phase == Phase::Picking {
            let chosen = s.pool[0];
            s.pick(s.turn, chosen, now).unwrap();
            picks += 1;
        }
        assert_eq!(picks, 7);
        assert_eq!(s.ct_roster.len(), 5);
        assert_eq!(s.t_roster.len(), 5);
        assert_eq!(s.turn, s.ct_captain);
        assert_eq!(s.maps.len(), 7);

        let mut bans = 0;
        let mut expected_side = Side::Ct;
        while !s.is_ready_for_result() {
            assert_eq!(s.turn_side(), expected_side);
            let map = s.maps[0].clone();
            s.ban(s.turn, &map).unwrap();
            bans += 1;
            expected_side = expected_side.opponent();
        }
        assert_eq!(bans, 6);
        assert_eq!(s.banned_maps.len() + s.maps.len(), 7);
        assert!(s.final_map().is_some());
    }

    #[test]
    fn test_two_vs_two_needs_one_pick() {
        let now = Utc::now();
        let mut s = session(4, now);
        let chosen = s.pool[0];
        let last = s.pool[1];
        let outcome = s.pick(s.ct_captain, chosen, now).unwrap();

        assert_eq!(outcome.auto_assigned, Some((last, Side::T)));
        assert!(outcome.pick_phase_complete);
        assert_eq!(s.phase, Phase::Banning);
        assert_eq!(s.turn, s.ct_captain);
        assert_eq!(s.ct_roster.len(), 2);
        assert_eq!(s.t_roster.len(), 2);
    }

    #[test]
    fn test_pick_check_order() {
        let now = Utc::now();
        let mut s = session(10, now);
        let pooled = outsider(&s);

        assert_eq!(kind(s.pick(pooled, pooled, now).unwrap_err()), "permission_denied");
        assert_eq!(kind(s.pick(s.t_captain, pooled, now).unwrap_err()), "invalid_turn");
        assert_eq!(kind(s.pick(s.ct_captain, s.t_captain, now).unwrap_err()), "invalid_choice");
        assert_eq!(kind(s.pick(s.ct_captain, 999, now).unwrap_err()), "invalid_choice");

        let err = s.pick(s.t_captain, pooled, now).unwrap_err();
        assert!(err.to_string().contains("CT"));
    }

    #[test]
    fn test_pick_timeout_is_lazy_and_inclusive() {
        let now = Utc::now();
        let mut s = session(10, now);
        let pooled = outsider(&s);

        let at_deadline = now + Duration::seconds(60);
        assert!(s.pick(s.ct_captain, pooled, at_deadline).is_ok());

        let late = now + Duration::seconds(61);
        let before = s.clone();
        let chosen = s.pool[0];
        assert_eq!(kind(s.pick(s.turn, chosen, late).unwrap_err()), "timeout");
        assert_eq!(s, before);
    }

    #[test]
    fn test_ban_rejections() {
        let now = Utc::now();
        let mut s = session(4, now);
        assert_eq!(kind(s.ban(s.ct_captain, "Dust2").unwrap_err()), "invalid_choice");

        let chosen = s.pool[0];
        s.pick(s.ct_captain, chosen, now).unwrap();

        assert_eq!(kind(s.ban(s.t_captain, "Dust2").unwrap_err()), "invalid_turn");
        assert_eq!(kind(s.ban(s.ct_captain, "Cache").unwrap_err()), "invalid_choice");
        let outcome = s.ban(s.ct_captain, "dust2").unwrap();
        assert_eq!(outcome.map, "Dust2");
        assert_eq!(kind(s.ban(s.t_captain, "Dust2").unwrap_err()), "invalid_choice");
        assert_eq!(kind(s.ban(s.ct_roster[1], "Nuke").unwrap_err()), "permission_denied");
    }

    #[test]
    fn test_final_ban_keeps_turn_and_locks() {
        let now = Utc::now();
        let mut s = session(4, now);
        let chosen = s.pool[0];
        s.pick(s.ct_captain, chosen, now).unwrap();

        for _ in 0..5 {
            let map = s.maps[0].clone();
            s.ban(s.turn, &map).unwrap();
        }
        let turn_before = s.turn;
        let map = s.maps[0].clone();
        let outcome = s.ban(s.turn, &map).unwrap();
        assert_eq!(outcome.final_map.as_deref(), s.final_map());
        assert_eq!(s.turn, turn_before);

        let last = s.maps[0].clone();
        assert_eq!(kind(s.ban(s.turn, &last).unwrap_err()), "invalid_choice");
        assert!(s.random_choice(&mut StdRng::seed_from_u64(3)).is_none());
    }

    #[test]
    fn test_random_choice_drives_to_completion() {
        let now = Utc::now();
        let mut s = session(10, now);
        let mut rng = StdRng::seed_from_u64(11);
        let mut steps = 0;
        while let Some(choice) = s.random_choice(&mut rng) {
            s.apply_for_turn(choice, now).unwrap();
            steps += 1;
            assert!(s.validate().is_ok());
        }
        assert_eq!(steps, 13);
        assert!(s.is_ready_for_result());
        assert_eq!(s.ct_roster.len() + s.t_roster.len(), 10);
    }
}
