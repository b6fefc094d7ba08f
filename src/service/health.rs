//! Health checks for the draft-room service
//!
//! Each aggregate is probed through its own lock; a poisoned or unreachable
//! aggregate makes the service unhealthy.

use crate::service::matchmaker::Matchmaker;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `draft_room_health_status`
    pub fn as_gauge(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Set when the component is not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_matches: usize,
    pub players_waiting_5v5: usize,
    pub players_waiting_2v2: usize,
    pub known_players: usize,
    pub matches_created: u64,
    pub autoplay_loops: usize,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Probe every aggregate and gather statistics
    pub async fn check(matchmaker: &Matchmaker) -> Result<Self> {
        let checks = vec![
            Self::check_queues(matchmaker),
            Self::check_players(matchmaker),
            Self::check_moderation(matchmaker),
            Self::check_sessions(matchmaker),
        ];
        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, c| acc.worst(c.status));

        Ok(HealthCheck {
            status,
            service: matchmaker.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(matchmaker),
        })
    }

    /// Cheap check used by `/health`
    pub fn liveness_check(matchmaker: &Matchmaker) -> HealthStatus {
        Self::check_queues(matchmaker)
            .status
            .worst(Self::check_sessions(matchmaker).status)
    }

    fn timed(name: &str, probe: impl FnOnce() -> Result<()>) -> ComponentCheck {
        let start = Instant::now();
        let (status, message) = match probe() {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Health probe {} failed: {}", name, e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };
        ComponentCheck {
            name: name.to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_queues(matchmaker: &Matchmaker) -> ComponentCheck {
        Self::timed("queues", || matchmaker.queues().status().map(|_| ()))
    }

    fn check_players(matchmaker: &Matchmaker) -> ComponentCheck {
        Self::timed("players", || matchmaker.registry().ranked_count().map(|_| ()))
    }

    fn check_moderation(matchmaker: &Matchmaker) -> ComponentCheck {
        Self::timed("moderation", || matchmaker.moderation().snapshot().map(|_| ()))
    }

    fn check_sessions(matchmaker: &Matchmaker) -> ComponentCheck {
        Self::timed("sessions", || matchmaker.sessions().handles().map(|_| ()))
    }

    fn gather_service_stats(matchmaker: &Matchmaker) -> ServiceStats {
        let mut stats = ServiceStats {
            active_matches: matchmaker.sessions().len(),
            known_players: matchmaker.registry().len(),
            matches_created: matchmaker.sessions().counter(),
            autoplay_loops: matchmaker.autoplay().pending(),
            uptime_seconds: matchmaker.uptime().as_secs(),
            ..ServiceStats::default()
        };
        if let Ok(queues) = matchmaker.queues().status() {
            for queue in queues {
                match queue.mode {
                    crate::types::Mode::FiveVsFive => stats.players_waiting_5v5 = queue.size(),
                    crate::types::Mode::TwoVsTwo => stats.players_waiting_2v2 = queue.size(),
                }
            }
        }
        stats
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
