//! Utility functions for the draft-room service

use crate::error::{MatchError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;
use uuid::Uuid;

/// Source of the current time, swappable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|p| p.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|p| p.into_inner())
    }
}

/// Generate a correlation id for an outbound notice
pub fn generate_notice_id() -> String {
    Uuid::new_v4().to_string()
}

/// Win percentage rounded to one decimal, 0.0 with no games played.
///
/// Exact ties round to the even digit, so 1 win in 16 games is 6.2.
pub fn win_rate(wins: u32, losses: u32) -> f64 {
    let total = wins + losses;
    if total == 0 {
        return 0.0;
    }
    let percent = wins as f64 / total as f64 * 100.0;
    (percent * 10.0).round_ties_even() / 10.0
}

/// Parse a restriction duration such as `30m`, `2h`, `1d` into seconds.
///
/// A bare number is read as minutes.
pub fn parse_duration(input: &str) -> Result<u64> {
    let input = input.trim();
    let invalid = || MatchError::ValidationError {
        reason: format!("Invalid duration '{}', expected e.g. 30m, 2h or 1d", input),
    };

    let (digits, unit_seconds) = match input.chars().last() {
        Some('m') => (&input[..input.len() - 1], 60),
        Some('h') => (&input[..input.len() - 1], 3600),
        Some('d') => (&input[..input.len() - 1], 86400),
        Some(_) => (input, 60),
        None => return Err(invalid().into()),
    };

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid().into());
    }

    amount
        .checked_mul(unit_seconds)
        .ok_or_else(|| invalid().into())
}
