//! Queue manager for both matchmaking modes

use crate::config::QueueConfig;
use crate::error::{MatchError, Result};
use crate::queue::state::{QueueSnapshot, QueueState};
use crate::types::{Mode, PlayerId};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Result of a successful join
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// The player is waiting; `size` includes them
    Queued {
        mode: Mode,
        size: usize,
        capacity: usize,
    },
    /// The join filled the queue; the full roster was removed in join order
    Filled { mode: Mode, roster: Vec<PlayerId> },
}

/// Both mode queues. Operations that touch both always lock 5v5 before 2v2.
#[derive(Debug)]
pub struct QueueManager {
    five_vs_five: Mutex<QueueState>,
    two_vs_two: Mutex<QueueState>,
}

type QueuePair<'a> = (MutexGuard<'a, QueueState>, MutexGuard<'a, QueueState>);

impl QueueManager {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            five_vs_five: Mutex::new(QueueState::new(
                Mode::FiveVsFive,
                config.capacity(Mode::FiveVsFive),
            )),
            two_vs_two: Mutex::new(QueueState::new(
                Mode::TwoVsTwo,
                config.capacity(Mode::TwoVsTwo),
            )),
        }
    }

    fn lock_both(&self) -> Result<QueuePair<'_>> {
        let five = self
            .five_vs_five
            .lock()
            .map_err(|_| MatchError::lock("5v5 queue"))?;
        let two = self
            .two_vs_two
            .lock()
            .map_err(|_| MatchError::lock("2v2 queue"))?;
        Ok((five, two))
    }

    fn lock_one(&self, mode: Mode) -> Result<MutexGuard<'_, QueueState>> {
        let queue = match mode {
            Mode::FiveVsFive => &self.five_vs_five,
            Mode::TwoVsTwo => &self.two_vs_two,
        };
        queue
            .lock()
            .map_err(|_| MatchError::lock(&format!("{} queue", mode)).into())
    }

    /// Add a player to the tail of `mode`'s queue, draining it when full.
    ///
    /// The membership checks, the append and the drain happen under both
    /// queue locks, so a fill can never overshoot or trigger twice.
    pub fn join(&self, id: PlayerId, mode: Mode) -> Result<JoinOutcome> {
        let (mut five, mut two) = self.lock_both()?;
        let (queue, other) = match mode {
            Mode::FiveVsFive => (&mut *five, &*two),
            Mode::TwoVsTwo => (&mut *two, &*five),
        };

        if queue.contains(id) {
            return Err(MatchError::AlreadyQueued {
                player_id: id,
                mode: mode.to_string(),
            }
            .into());
        }
        if other.contains(id) {
            return Err(MatchError::CrossModeConflict {
                player_id: id,
                other_mode: other.mode().to_string(),
            }
            .into());
        }

        queue.push(id);
        debug!(
            "Player {} joined {} queue ({}/{})",
            id,
            mode,
            queue.len(),
            queue.capacity()
        );

        match queue.drain_full() {
            Some(roster) => {
                info!(
                    "{} queue filled with {} players, handing roster to a new match",
                    mode,
                    roster.len()
                );
                Ok(JoinOutcome::Filled { mode, roster })
            }
            None => Ok(JoinOutcome::Queued {
                mode,
                size: queue.len(),
                capacity: queue.capacity(),
            }),
        }
    }

    /// Remove a player from `mode`'s queue. Returns the remaining size.
    pub fn leave(&self, id: PlayerId, mode: Mode) -> Result<usize> {
        let mut queue = self.lock_one(mode)?;
        if !queue.remove(id) {
            return Err(MatchError::NotInQueue {
                player_id: id,
                mode: mode.to_string(),
            }
            .into());
        }
        debug!("Player {} left {} queue ({} remaining)", id, mode, queue.len());
        Ok(queue.len())
    }

    /// Remove a player from whichever queue holds them
    pub fn remove_everywhere(&self, id: PlayerId) -> Result<Option<Mode>> {
        let (mut five, mut two) = self.lock_both()?;
        if five.remove(id) {
            return Ok(Some(Mode::FiveVsFive));
        }
        if two.remove(id) {
            return Ok(Some(Mode::TwoVsTwo));
        }
        Ok(None)
    }

    /// Empty one queue, or both when `mode` is `None`
    pub fn clear(&self, mode: Option<Mode>) -> Result<Vec<PlayerId>> {
        let (mut five, mut two) = self.lock_both()?;
        let mut removed = Vec::new();
        if mode != Some(Mode::TwoVsTwo) {
            removed.extend(five.clear());
        }
        if mode != Some(Mode::FiveVsFive) {
            removed.extend(two.clear());
        }
        info!(
            "Cleared {} queue(s), {} players removed",
            mode.map(|m| m.to_string()).unwrap_or_else(|| "all".to_string()),
            removed.len()
        );
        Ok(removed)
    }

    /// Mode the player is currently queued for, if any
    pub fn queued_mode(&self, id: PlayerId) -> Result<Option<Mode>> {
        let (five, two) = self.lock_both()?;
        if five.contains(id) {
            Ok(Some(Mode::FiveVsFive))
        } else if two.contains(id) {
            Ok(Some(Mode::TwoVsTwo))
        } else {
            Ok(None)
        }
    }

    pub fn snapshot(&self, mode: Mode) -> Result<QueueSnapshot> {
        Ok(self.lock_one(mode)?.snapshot())
    }

    /// Both queues, 5v5 first
    pub fn status(&self) -> Result<Vec<QueueSnapshot>> {
        let (five, two) = self.lock_both()?;
        Ok(vec![five.snapshot(), two.snapshot()])
    }

    /// Load persisted queue contents.
    ///
    /// Duplicates, players already restored into the other queue and entries
    /// that would fill a queue are dropped with a warning.
    pub fn restore(&self, snapshots: Vec<QueueSnapshot>) -> Result<()> {
        let (mut five, mut two) = self.lock_both()?;
        five.clear();
        two.clear();

        let mut seen = HashSet::new();
        for snapshot in snapshots {
            let queue = match snapshot.mode {
                Mode::FiveVsFive => &mut *five,
                Mode::TwoVsTwo => &mut *two,
            };
            for id in snapshot.members {
                if !seen.insert(id) {
                    warn!("Dropping duplicate queue entry for player {}", id);
                    continue;
                }
                if queue.len() + 1 >= queue.capacity() {
                    warn!(
                        "Dropping restored {} queue entry for player {}, queue would fill",
                        queue.mode(),
                        id
                    );
                    continue;
                }
                queue.push(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::match_error;
    use proptest::prelude::*;

    fn manager() -> QueueManager {
        QueueManager::new(&QueueConfig::default())
    }

    fn kind(err: anyhow::Error) -> &'static str {
        match_error(&err).unwrap().kind()
    }

    #[test]
    fn test_join_rejections() {
        let queues = manager();
        queues.join(1, Mode::FiveVsFive).unwrap();

        assert_eq!(
            kind(queues.join(1, Mode::FiveVsFive).unwrap_err()),
            "already_queued"
        );
        assert_eq!(
            kind(queues.join(1, Mode::TwoVsTwo).unwrap_err()),
            "cross_mode_conflict"
        );
        assert_eq!(queues.queued_mode(1).unwrap(), Some(Mode::FiveVsFive));
    }

    #[test]
    fn test_leave_after_leave_is_not_in_queue() {
        let queues = manager();
        queues.join(1, Mode::TwoVsTwo).unwrap();
        queues.join(2, Mode::TwoVsTwo).unwrap();
        assert_eq!(queues.leave(1, Mode::TwoVsTwo).unwrap(), 1);

        let before = queues.snapshot(Mode::TwoVsTwo).unwrap();
        assert_eq!(kind(queues.leave(1, Mode::TwoVsTwo).unwrap_err()), "not_in_queue");
        assert_eq!(queues.snapshot(Mode::TwoVsTwo).unwrap(), before);
    }

    #[test]
    fn test_fill_drains_exactly_capacity() {
        let queues = manager();
        for id in 1..=3 {
            assert!(matches!(
                queues.join(id, Mode::TwoVsTwo).unwrap(),
                JoinOutcome::Queued { .. }
            ));
        }
        match queues.join(4, Mode::TwoVsTwo).unwrap() {
            JoinOutcome::Filled { mode, roster } => {
                assert_eq!(mode, Mode::TwoVsTwo);
                assert_eq!(roster, vec![1, 2, 3, 4]);
            }
            other => panic!("expected a fill, got {:?}", other),
        }
        assert_eq!(queues.snapshot(Mode::TwoVsTwo).unwrap().size(), 0);
    }

    #[test]
    fn test_clear_one_mode() {
        let queues = manager();
        queues.join(1, Mode::FiveVsFive).unwrap();
        queues.join(2, Mode::TwoVsTwo).unwrap();

        assert_eq!(queues.clear(Some(Mode::TwoVsTwo)).unwrap(), vec![2]);
        assert_eq!(queues.snapshot(Mode::FiveVsFive).unwrap().members, vec![1]);
        assert_eq!(queues.clear(None).unwrap(), vec![1]);
    }

    #[test]
    fn test_restore_drops_conflicts() {
        let queues = manager();
        queues
            .restore(vec![
                QueueSnapshot {
                    mode: Mode::FiveVsFive,
                    capacity: 10,
                    members: vec![1, 2, 2],
                },
                QueueSnapshot {
                    mode: Mode::TwoVsTwo,
                    capacity: 4,
                    members: vec![1, 3, 4, 5, 6],
                },
            ])
            .unwrap();

        assert_eq!(queues.snapshot(Mode::FiveVsFive).unwrap().members, vec![1, 2]);
        assert_eq!(queues.snapshot(Mode::TwoVsTwo).unwrap().members, vec![3, 4, 5]);
    }

    proptest! {
        #[test]
        fn prop_queue_never_exceeds_capacity(ops in prop::collection::vec((1i64..30, any::<bool>(), any::<bool>()), 1..200)) {
            let queues = manager();
            for (id, five, join) in ops {
                let mode = if five { Mode::FiveVsFive } else { Mode::TwoVsTwo };
                if join {
                    if let Ok(JoinOutcome::Filled { roster, mode }) = queues.join(id, mode) {
                        prop_assert_eq!(roster.len(), QueueConfig::default().capacity(mode));
                    }
                } else {
                    let _ = queues.leave(id, mode);
                }
                for snapshot in queues.status().unwrap() {
                    prop_assert!(snapshot.size() < snapshot.capacity);
                }
            }
        }
    }
}
