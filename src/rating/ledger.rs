//! Applies match results and admin overrides to the player registry

use crate::draft::MatchSession;
use crate::error::Result;
use crate::players::PlayerRegistry;
use crate::rating::calculator::RatingCalculator;
use crate::types::{MatchId, Mode, PlayerId, RatingChange, Side};
use std::sync::Arc;
use tracing::info;

/// Summary of a recorded result
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub mode: Mode,
    pub winner: Side,
    pub final_map: Option<String>,
    pub winners: Vec<PlayerId>,
    pub losers: Vec<PlayerId>,
    /// One entry per real player; simulated players have none
    pub changes: Vec<RatingChange>,
}

#[derive(Clone)]
pub struct RatingLedger {
    registry: Arc<PlayerRegistry>,
    calculator: Arc<dyn RatingCalculator>,
}

impl RatingLedger {
    pub fn new(registry: Arc<PlayerRegistry>, calculator: Arc<dyn RatingCalculator>) -> Self {
        Self {
            registry,
            calculator,
        }
    }

    pub fn calculator(&self) -> &dyn RatingCalculator {
        self.calculator.as_ref()
    }

    /// Rate every roster member of a detached session.
    ///
    /// Any phase is accepted; players still in the pool are not part of
    /// either side and are left alone.
    pub fn record(&self, session: &MatchSession, winner: Side) -> Result<MatchResult> {
        let winners = session.roster(winner).to_vec();
        let losers = session.roster(winner.opponent()).to_vec();

        let outcomes: Vec<(PlayerId, bool)> = winners
            .iter()
            .map(|id| (*id, true))
            .chain(losers.iter().map(|id| (*id, false)))
            .collect();
        let changes = self
            .registry
            .apply_outcomes(&outcomes, self.calculator.as_ref())?;

        info!(
            "Recorded {} win for match {} ({}): {} rating changes",
            winner,
            session.id,
            session.mode,
            changes.len()
        );

        Ok(MatchResult {
            match_id: session.id,
            mode: session.mode,
            winner,
            final_map: session.final_map().map(str::to_string),
            winners,
            losers,
            changes,
        })
    }

    /// Admin override, clamped to the rating floor
    pub fn set_rating(&self, id: PlayerId, value: i32) -> Result<RatingChange> {
        self.registry
            .set_rating(id, value, self.calculator.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::draft::DEFAULT_MAPS;
    use crate::rating::FixedDeltaCalculator;
    use crate::types::PlayerProfile;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn drafted(roster: Vec<PlayerId>) -> MatchSession {
        let maps: Vec<String> = DEFAULT_MAPS.iter().map(|m| m.to_string()).collect();
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(9);
        let mut session =
            MatchSession::start(MatchId(1), Mode::TwoVsTwo, roster, &maps, 60, 0, now, &mut rng)
                .unwrap();
        while let Some(choice) = session.random_choice(&mut rng) {
            session.apply_for_turn(choice, now).unwrap();
        }
        session
    }

    fn ledger() -> (Arc<PlayerRegistry>, RatingLedger) {
        let registry = Arc::new(PlayerRegistry::new(1000));
        let ledger = RatingLedger::new(registry.clone(), Arc::new(FixedDeltaCalculator::default()));
        (registry, ledger)
    }

    #[test]
    fn test_winners_gain_losers_drop() {
        let (registry, ledger) = ledger();
        for id in 1..=4 {
            registry.register(id, &format!("e{}", id), &format!("p{}", id)).unwrap();
        }
        registry.set_rating(1, 110, ledger.calculator()).unwrap();

        let session = drafted(vec![1, 2, 3, 4]);
        let result = ledger.record(&session, Side::Ct).unwrap();
        assert_eq!(result.changes.len(), 4);
        assert!(result.final_map.is_some());

        for id in session.roster(Side::Ct) {
            let p = registry.get(*id).unwrap().unwrap();
            assert_eq!(p.wins, 1);
            assert_eq!(p.win_rate, 100.0);
        }
        for id in session.roster(Side::T) {
            let p = registry.get(*id).unwrap().unwrap();
            assert_eq!(p.losses, 1);
            assert_eq!(p.win_rate, 0.0);
            let expected = if *id == 1 { 100 } else { 980 };
            assert_eq!(p.rating, expected);
        }
    }

    #[test]
    fn test_simulated_members_untouched() {
        let (registry, ledger) = ledger();
        for id in [-100001, -100002, -100003] {
            registry.insert(PlayerProfile::new(id, "bot", 1234)).unwrap();
        }
        registry.register(1, "e1", "human").unwrap();

        let session = drafted(vec![1, -100001, -100002, -100003]);
        let result = ledger.record(&session, Side::T).unwrap();
        assert_eq!(result.changes.len(), 1);
        for id in [-100001, -100002, -100003] {
            let bot = registry.get(id).unwrap().unwrap();
            assert_eq!((bot.rating, bot.wins, bot.losses), (1234, 0, 0));
        }
    }
}
