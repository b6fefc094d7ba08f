//! Metrics collection using Prometheus
//!
//! Every counter and gauge the draft-room service exports lives here, grouped
//! by the component that moves it.

use crate::types::Mode;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Who performed a draft action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    Human,
    Autoplay,
}

impl ActionSource {
    fn as_str(self) -> &'static str {
        match self {
            ActionSource::Human => "human",
            ActionSource::Autoplay => "autoplay",
        }
    }
}

/// How a match came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOrigin {
    /// A queue filled
    Queue,
    /// An administrator started a practice match
    Practice,
}

impl MatchOrigin {
    fn as_str(self) -> &'static str {
        match self {
            MatchOrigin::Queue => "queue",
            MatchOrigin::Practice => "practice",
        }
    }
}

/// Main metrics collector for the draft-room service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue metrics
    queue_metrics: QueueMetrics,

    /// Match lifecycle metrics
    match_metrics: MatchMetrics,

    /// Draft and autoplay metrics
    draft_metrics: DraftMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Commands handled by the dispatcher, by outcome
    pub commands_total: IntCounterVec,

    /// Snapshot saves, by outcome
    pub snapshots_total: IntCounterVec,

    /// Startups that discarded an unreadable state document
    pub state_resets_total: IntCounter,
}

/// Queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Successful joins
    pub joins_total: IntCounterVec,

    /// Successful leaves
    pub leaves_total: IntCounterVec,

    /// Queues that reached capacity
    pub fills_total: IntCounterVec,

    /// Players currently waiting
    pub queue_size: IntGaugeVec,
}

/// Match lifecycle metrics
#[derive(Clone)]
pub struct MatchMetrics {
    pub matches_started_total: IntCounterVec,

    pub matches_completed_total: IntCounterVec,

    /// Matches removed by a detected pick timeout
    pub pick_timeouts_total: IntCounter,

    /// Sessions currently in the table
    pub active_sessions: IntGauge,
}

/// Draft and autoplay metrics
#[derive(Clone)]
pub struct DraftMetrics {
    /// Applied picks and bans
    pub draft_actions_total: IntCounterVec,

    /// Picks and bans refused, by error kind
    pub rejected_actions_total: IntCounterVec,

    /// Simulated turns played by autoplay loops
    pub autoplay_steps_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Operation durations by name
    pub operation_duration: HistogramVec,

    /// Time to write a snapshot
    pub snapshot_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let draft_metrics = DraftMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            draft_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn draft(&self) -> &DraftMetrics {
        &self.draft_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a successful queue join and the resulting queue size
    pub fn record_queue_join(&self, mode: Mode, size: usize) {
        self.queue_metrics
            .joins_total
            .with_label_values(&[mode.as_str()])
            .inc();
        self.set_queue_size(mode, size);
    }

    pub fn record_queue_leave(&self, mode: Mode, size: usize) {
        self.queue_metrics
            .leaves_total
            .with_label_values(&[mode.as_str()])
            .inc();
        self.set_queue_size(mode, size);
    }

    /// Record a join that filled the queue; the queue is empty afterwards
    pub fn record_queue_fill(&self, mode: Mode) {
        self.queue_metrics
            .joins_total
            .with_label_values(&[mode.as_str()])
            .inc();
        self.queue_metrics
            .fills_total
            .with_label_values(&[mode.as_str()])
            .inc();
        self.set_queue_size(mode, 0);
    }

    pub fn set_queue_size(&self, mode: Mode, size: usize) {
        self.queue_metrics
            .queue_size
            .with_label_values(&[mode.as_str()])
            .set(size as i64);
    }

    pub fn record_match_started(&self, mode: Mode, origin: MatchOrigin) {
        self.match_metrics
            .matches_started_total
            .with_label_values(&[mode.as_str(), origin.as_str()])
            .inc();
        self.match_metrics.active_sessions.inc();
    }

    pub fn record_match_completed(&self, mode: Mode) {
        self.match_metrics
            .matches_completed_total
            .with_label_values(&[mode.as_str()])
            .inc();
        self.match_metrics.active_sessions.dec();
    }

    pub fn record_pick_timeout(&self) {
        self.match_metrics.pick_timeouts_total.inc();
        self.match_metrics.active_sessions.dec();
    }

    /// Overwrite the active session gauge, used after a restore
    pub fn set_active_sessions(&self, count: usize) {
        self.match_metrics.active_sessions.set(count as i64);
    }

    /// Record an applied pick or ban
    pub fn record_draft_action(&self, kind: &str, source: ActionSource) {
        self.draft_metrics
            .draft_actions_total
            .with_label_values(&[kind, source.as_str()])
            .inc();
        if source == ActionSource::Autoplay {
            self.draft_metrics.autoplay_steps_total.inc();
        }
    }

    pub fn record_rejected_action(&self, error_kind: &str) {
        self.draft_metrics
            .rejected_actions_total
            .with_label_values(&[error_kind])
            .inc();
    }

    /// Record a dispatched command; `outcome` is `ok` or an error kind
    pub fn record_command(&self, command: &str, outcome: &str) {
        self.service_metrics
            .commands_total
            .with_label_values(&[command, outcome])
            .inc();
    }

    pub fn record_snapshot(&self, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };
        self.service_metrics
            .snapshots_total
            .with_label_values(&[status])
            .inc();
        self.performance_metrics
            .snapshot_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a startup that fell back to an empty document
    pub fn record_state_reset(&self) {
        self.service_metrics.state_resets_total.inc();
    }

    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        TextEncoder::new()
            .encode_to_string(&metric_families)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("draft_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "draft_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let commands_total = IntCounterVec::new(
            Opts::new("draft_room_commands_total", "Commands handled"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let snapshots_total = IntCounterVec::new(
            Opts::new("draft_room_snapshots_total", "State snapshots written"),
            &["status"],
        )?;
        registry.register(Box::new(snapshots_total.clone()))?;

        let state_resets_total = IntCounter::new(
            "draft_room_state_resets_total",
            "Unreadable state documents replaced by an empty one",
        )?;
        registry.register(Box::new(state_resets_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            commands_total,
            snapshots_total,
            state_resets_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounterVec::new(
            Opts::new("draft_room_queue_joins_total", "Total queue joins"),
            &["mode"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let leaves_total = IntCounterVec::new(
            Opts::new("draft_room_queue_leaves_total", "Total queue leaves"),
            &["mode"],
        )?;
        registry.register(Box::new(leaves_total.clone()))?;

        let fills_total = IntCounterVec::new(
            Opts::new("draft_room_queue_fills_total", "Queues filled to capacity"),
            &["mode"],
        )?;
        registry.register(Box::new(fills_total.clone()))?;

        let queue_size = IntGaugeVec::new(
            Opts::new("draft_room_queue_size", "Players currently queued"),
            &["mode"],
        )?;
        registry.register(Box::new(queue_size.clone()))?;

        Ok(Self {
            joins_total,
            leaves_total,
            fills_total,
            queue_size,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_started_total = IntCounterVec::new(
            Opts::new("draft_room_matches_started_total", "Matches started"),
            &["mode", "origin"],
        )?;
        registry.register(Box::new(matches_started_total.clone()))?;

        let matches_completed_total = IntCounterVec::new(
            Opts::new(
                "draft_room_matches_completed_total",
                "Matches with a recorded result",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(matches_completed_total.clone()))?;

        let pick_timeouts_total = IntCounter::new(
            "draft_room_pick_timeouts_total",
            "Matches cancelled by pick timeout",
        )?;
        registry.register(Box::new(pick_timeouts_total.clone()))?;

        let active_sessions =
            IntGauge::new("draft_room_active_sessions", "Sessions in progress")?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            matches_started_total,
            matches_completed_total,
            pick_timeouts_total,
            active_sessions,
        })
    }
}

impl DraftMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let draft_actions_total = IntCounterVec::new(
            Opts::new("draft_room_draft_actions_total", "Applied picks and bans"),
            &["kind", "source"],
        )?;
        registry.register(Box::new(draft_actions_total.clone()))?;

        let rejected_actions_total = IntCounterVec::new(
            Opts::new(
                "draft_room_rejected_actions_total",
                "Refused picks and bans",
            ),
            &["error"],
        )?;
        registry.register(Box::new(rejected_actions_total.clone()))?;

        let autoplay_steps_total = IntCounter::new(
            "draft_room_autoplay_steps_total",
            "Simulated captain turns played",
        )?;
        registry.register(Box::new(autoplay_steps_total.clone()))?;

        Ok(Self {
            draft_actions_total,
            rejected_actions_total,
            autoplay_steps_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "draft_room_operation_duration_seconds",
                "Matchmaker operation duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let snapshot_duration = Histogram::with_opts(
            HistogramOpts::new(
                "draft_room_snapshot_duration_seconds",
                "Time to write a state snapshot",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(snapshot_duration.clone()))?;

        Ok(Self {
            operation_duration,
            snapshot_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _queue = collector.queue();
        let _matches = collector.matches();
        let _draft = collector.draft();
        let _performance = collector.performance();
    }

    #[test]
    fn test_queue_gauges_follow_joins_and_fills() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_queue_join(Mode::TwoVsTwo, 3);
        let gauge = collector.queue().queue_size.with_label_values(&["2v2"]);
        assert_eq!(gauge.get(), 3);

        collector.record_queue_fill(Mode::TwoVsTwo);
        assert_eq!(gauge.get(), 0);
        assert_eq!(
            collector.queue().joins_total.with_label_values(&["2v2"]).get(),
            2
        );
    }

    #[test]
    fn test_session_gauge_tracks_lifecycle() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_match_started(Mode::FiveVsFive, MatchOrigin::Queue);
        collector.record_match_started(Mode::TwoVsTwo, MatchOrigin::Practice);
        collector.record_match_completed(Mode::FiveVsFive);
        assert_eq!(collector.matches().active_sessions.get(), 1);

        collector.record_pick_timeout();
        assert_eq!(collector.matches().active_sessions.get(), 0);
        assert_eq!(collector.matches().pick_timeouts_total.get(), 1);
    }

    #[test]
    fn test_autoplay_actions_count_as_steps() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_draft_action("pick", ActionSource::Human);
        collector.record_draft_action("ban", ActionSource::Autoplay);
        collector.record_draft_action("ban", ActionSource::Autoplay);

        assert_eq!(collector.draft().autoplay_steps_total.get(), 2);
        assert_eq!(
            collector
                .draft()
                .draft_actions_total
                .with_label_values(&["ban", "autoplay"])
                .get(),
            2
        );
    }

    #[test]
    fn test_gather_text_contains_prefix() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_command("play5", "ok");
        collector.update_health_status(2);

        let text = collector.gather_text().unwrap();
        assert!(text.contains("draft_room_commands_total"));
        assert!(text.contains("draft_room_health_status 2"));
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().unwrap();
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
