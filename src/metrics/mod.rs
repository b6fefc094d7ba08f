//! Prometheus counters for queues, matches and draft actions, and the HTTP
//! server that exposes them next to the health probes.

pub mod collector;
pub mod health;

pub use collector::{
    ActionSource, DraftMetrics, MatchMetrics, MatchOrigin, MetricsCollector, MetricsTimer,
    PerformanceMetrics, QueueMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};

use std::sync::Arc;

/// Collector plus the server exposing it; cloned into background tasks
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    server: Arc<HealthServer>,
}

impl MetricsService {
    pub fn new(collector: Arc<MetricsCollector>, server: Arc<HealthServer>) -> Self {
        Self { collector, server }
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.collector)
    }

    /// Runs until [`MetricsService::stop`]
    pub async fn start(&self) -> anyhow::Result<()> {
        self.server.start().await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.server.stop().await
    }
}
