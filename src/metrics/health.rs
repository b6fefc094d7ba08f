//! HTTP monitoring surface
//!
//! Serves liveness, Prometheus exposition and a queue/match summary for the
//! running matchmaker.

use super::MetricsCollector;
use crate::service::{HealthCheck, HealthStatus, Matchmaker};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "draft-room";

/// Bind address of the monitoring server
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Handles shared by every route
#[derive(Clone)]
pub struct HealthServerState {
    pub collector: Arc<MetricsCollector>,
    pub matchmaker: Option<Arc<Matchmaker>>,
}

pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                collector,
                matchmaker: None,
            },
            shutdown_tx,
        }
    }

    /// Attach the service whose health is reported
    pub fn with_matchmaker(mut self, matchmaker: Arc<Matchmaker>) -> Self {
        self.state.matchmaker = Some(matchmaker);
        self
    }

    /// Serve until [`HealthServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| format!("bad monitoring address {}:{}", self.config.host, self.config.port))?;

        let router = self.router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;

        info!(%addr, "Monitoring endpoints up");

        let mut stop_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.recv().await;
                debug!("Monitoring server draining");
            })
            .await?;

        info!(%addr, "Monitoring endpoints down");
        Ok(())
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/health", get(liveness))
            .route("/metrics", get(exposition))
            .route("/stats", get(summary))
            .with_state(self.state.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        // No receiver means the server never started
        if self.shutdown_tx.send(()).is_err() {
            warn!("Monitoring server was not running");
        }
        Ok(())
    }
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": crate::VERSION,
        "endpoints": ["/health", "/metrics", "/stats"]
    }))
}

/// Cheap liveness probe; degraded still answers 200
async fn liveness(State(state): State<HealthServerState>) -> impl IntoResponse {

    let Some(matchmaker) = &state.matchmaker else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": HealthStatus::Unhealthy,
                "service": SERVICE_NAME,
                "version": crate::VERSION,
                "error": "matchmaker not attached"
            })),
        );
    };

    let status = HealthCheck::liveness_check(matchmaker);
    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        code,
        Json(json!({
            "status": status,
            "service": SERVICE_NAME,
            "version": crate::VERSION
        })),
    )
}

async fn exposition(State(state): State<HealthServerState>) -> Response {
    match state.collector.gather_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Prometheus encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("encoding failed: {}", e),
            )
                .into_response()
        }
    }
}

/// Queue, match and component summary
async fn summary(State(state): State<HealthServerState>) -> impl IntoResponse {

    let Some(matchmaker) = &state.matchmaker else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "service": { "name": SERVICE_NAME, "status": HealthStatus::Unhealthy },
                "error": "matchmaker not attached"
            })),
        );
    };

    match HealthCheck::check(matchmaker).await {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptime_seconds": health.stats.uptime_seconds
                },
                "queues": {
                    "5v5": health.stats.players_waiting_5v5,
                    "2v2": health.stats.players_waiting_2v2
                },
                "matches": {
                    "active": health.stats.active_matches,
                    "created": health.stats.matches_created,
                    "autoplay_loops": health.stats.autoplay_loops
                },
                "players": health.stats.known_players,
                "checks": health.checks,
                "timestamp": health.timestamp
            })),
        ),
        Err(e) => {
            error!(error = %e, "Summary probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": { "name": SERVICE_NAME, "status": HealthStatus::Unhealthy },
                    "error": e.to_string()
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::gateway::MockNotifier;
    use crate::storage::InMemoryStore;
    use crate::types::Mode;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn collector() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().unwrap())
    }

    fn server_with_matchmaker() -> HealthServer {
        let metrics = collector();
        let matchmaker = Arc::new(Matchmaker::new(
            AppConfig::default(),
            Arc::new(MockNotifier::new()),
            Arc::new(InMemoryStore::new()),
            metrics.clone(),
        ));
        HealthServer::new(HealthServerConfig::default(), metrics).with_matchmaker(matchmaker)
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());
        assert_eq!(get_status(server.router(), "/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_exposition_is_prometheus_text() {
        let metrics = collector();
        metrics.record_queue_join(Mode::FiveVsFive, 1);
        metrics.update_health_status(2);

        let server = HealthServer::new(HealthServerConfig::default(), metrics);
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            prometheus::TEXT_FORMAT
        );
    }

    #[tokio::test]
    async fn test_endpoints_without_matchmaker() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());
        let app = server.router();

        assert_eq!(
            get_status(app.clone(), "/health").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(app, "/stats").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_endpoints_with_matchmaker() {
        let app = server_with_matchmaker().router();

        assert_eq!(get_status(app.clone(), "/health").await, StatusCode::OK);
        assert_eq!(get_status(app, "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let server = HealthServer::new(HealthServerConfig::default(), collector());
        assert_eq!(
            get_status(server.router(), "/nonexistent").await,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_default_bind_address() {
        let HealthServerConfig { host, port } = HealthServerConfig::default();
        assert_eq!(format!("{}:{}", host, port), "0.0.0.0:8080");
    }
}
