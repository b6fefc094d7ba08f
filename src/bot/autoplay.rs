//! Autoplay for simulated captains
//!
//! When the turn passes to a simulated captain a background task waits the
//! configured delay and asks the driver to play one turn. The loop repeats
//! while the next turn is simulated again and stops at a human turn, at a
//! decided map, when the session is gone, or after a bounded number of steps.

use crate::config::DraftConfig;
use crate::error::Result;
use crate::types::MatchId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a single simulated turn did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayStep {
    /// An action was applied; `next_simulated` says whether to keep going
    Acted { next_simulated: bool },
    /// Nothing to do: human turn, decided map, or no such session
    Idle,
}

/// Something that can play one simulated turn of a match.
///
/// Implementations must apply the action under the match's own lock and
/// through the same pick/ban rules a human captain is held to.
#[async_trait]
pub trait SimulatedTurnDriver: Send + Sync {
    async fn play_simulated_turn(&self, match_id: MatchId) -> Result<AutoplayStep>;
}

/// Spawns and tracks autoplay loops
#[derive(Debug)]
pub struct AutoplayScheduler {
    delay: Duration,
    max_steps: usize,
    tasks: Mutex<Vec<(MatchId, JoinHandle<usize>)>>,
    /// Actions applied by loops since the last `wait_idle`
    applied: Arc<AtomicUsize>,
}

impl AutoplayScheduler {
    pub fn new(config: &DraftConfig) -> Self {
        Self::with_limits(config.autoplay_delay(), config.autoplay_max_steps)
    }

    pub fn with_limits(delay: Duration, max_steps: usize) -> Self {
        Self {
            delay,
            max_steps,
            tasks: Mutex::new(Vec::new()),
            applied: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start an autoplay loop for `match_id` in the background
    pub fn schedule(&self, driver: Arc<dyn SimulatedTurnDriver>, match_id: MatchId) {
        let delay = self.delay;
        let max_steps = self.max_steps;
        let applied = self.applied.clone();
        let handle = tokio::spawn(async move {
            let acted = run_loop(driver, match_id, delay, max_steps).await;
            applied.fetch_add(acted, Ordering::SeqCst);
            acted
        });

        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|(_, task)| !task.is_finished());
                tasks.push((match_id, handle));
            }
            Err(_) => warn!("Autoplay task list lock poisoned, match {} untracked", match_id),
        }
    }

    /// Number of loops that have not finished yet
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|(_, t)| !t.is_finished()).count())
            .unwrap_or(0)
    }

    /// Wait for every scheduled loop, including ones started while waiting.
    /// Returns the number of simulated actions applied since the previous call.
    pub async fn wait_idle(&self) -> usize {
        loop {
            let batch: Vec<(MatchId, JoinHandle<usize>)> = match self.tasks.lock() {
                Ok(mut tasks) => tasks.drain(..).collect(),
                Err(_) => break,
            };
            if batch.is_empty() {
                break;
            }
            for (match_id, handle) in batch {
                match handle.await {
                    Ok(_) => {}
                    Err(e) if e.is_cancelled() => debug!("Autoplay for match {} cancelled", match_id),
                    Err(e) => warn!("Autoplay for match {} panicked: {}", match_id, e),
                }
            }
        }
        self.applied.swap(0, Ordering::SeqCst)
    }

    /// Cancel every running loop
    pub fn abort_all(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (match_id, handle) in tasks.drain(..) {
                if !handle.is_finished() {
                    debug!("Aborting autoplay for match {}", match_id);
                    handle.abort();
                }
            }
        }
    }
}

/// Play simulated turns until a stop condition. Returns the number of actions.
pub async fn run_loop(
    driver: Arc<dyn SimulatedTurnDriver>,
    match_id: MatchId,
    delay: Duration,
    max_steps: usize,
) -> usize {
    let mut acted = 0;
    while acted < max_steps {
        tokio::time::sleep(delay).await;

        match driver.play_simulated_turn(match_id).await {
            Ok(AutoplayStep::Acted { next_simulated }) => {
                acted += 1;
                if !next_simulated {
                    break;
                }
            }
            Ok(AutoplayStep::Idle) => break,
            Err(e) => {
                warn!("Autoplay for match {} stopped: {}", match_id, e);
                break;
            }
        }
    }

    if acted >= max_steps {
        warn!(
            "Autoplay for match {} hit its step bound of {}",
            match_id, max_steps
        );
    } else {
        info!("Autoplay for match {} finished after {} actions", match_id, acted);
    }
    acted
}
