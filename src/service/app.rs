//! Process-level wiring
//!
//! [`AppState`] wires the matchmaker to its store, notifier and metrics,
//! restores saved state on start, and owns the background tasks.

use crate::config::{validate_config, AppConfig};
use crate::gateway::{Dispatcher, LogNotifier, Notifier};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::service::health::HealthCheck;
use crate::service::matchmaker::Matchmaker;
use crate::storage::{JsonFileStore, SnapshotStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Failures while bringing the process up or down
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("state storage failed: {message}")]
    Storage { message: String },

    #[error("startup failed: {message}")]
    Initialization { message: String },
}

pub struct AppState {
    config: AppConfig,
    matchmaker: Arc<Matchmaker>,
    dispatcher: Arc<Dispatcher>,
    metrics_service: Arc<MetricsService>,
    /// Monitoring server and the gauge refresher
    tasks: Vec<JoinHandle<()>>,
    running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Build the service with a JSON file store and a logging notifier
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let store = Arc::new(JsonFileStore::new(config.storage.state_file.clone()));
        Self::with_components(config, store, Arc::new(LogNotifier))
    }

    /// Build the service around an explicit store and notifier
    pub fn with_components(
        config: AppConfig,
        store: Arc<dyn SnapshotStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ServiceError> {
        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;
        info!(
            service = %config.service.name,
            state_file = %config.storage.state_file.display(),
            admins = config.service.admin_ids.len(),
            "Wiring draft-room"
        );
        if config.service.admin_ids.is_empty() {
            warn!("No administrators configured, administrative commands are unavailable");
        }

        let collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("metrics registry: {}", e),
                })?,
            );

        let matchmaker = Arc::new(Matchmaker::new(
            config.clone(),
            notifier,
            store,
            collector.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(matchmaker.clone()));

        let bind = HealthServerConfig {
            port: config.service.health_port,
            ..HealthServerConfig::default()
        };
        let health_server = Arc::new(
            HealthServer::new(bind, collector.clone()).with_matchmaker(matchmaker.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(collector, health_server));

        Ok(Self {
            config,
            matchmaker,
            dispatcher,
            metrics_service,
            tasks: Vec::new(),
            running: Arc::new(RwLock::new(false)),
        })
    }

    /// Restore saved state and start every background component
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        let restored = self
            .matchmaker
            .load_state()
            .await
            .map_err(|e| ServiceError::Storage {
                message: format!("load: {}", e),
            })?;
        let resumed = self
            .matchmaker
            .resume_autoplay()
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("autoplay resume: {}", e),
            })?;
        info!(restored, resumed, "Saved matches restored");

        *self.running.write().await = true;

        if self.config.service.enable_health_server {
            self.spawn_monitoring().await;
        } else {
            info!("Monitoring endpoints disabled");
        }
        self.spawn_gauge_refresh();
        Ok(())
    }

    /// Stop background work and write a final snapshot
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        *self.running.write().await = false;
        self.abort_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!(error = %e, "Monitoring server did not stop cleanly");
        }

        self.matchmaker
            .shutdown()
            .await
            .map_err(|e| ServiceError::Storage {
                message: format!("final save: {}", e),
            })?;

        match HealthCheck::check(&self.matchmaker).await {
            Ok(health) => info!(stats = ?health.stats, "draft-room stopped"),
            Err(e) => debug!(error = %e, "draft-room stopped without final stats"),
        }
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub fn matchmaker(&self) -> Arc<Matchmaker> {
        self.matchmaker.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    async fn spawn_monitoring(&mut self) {
        let service = self.metrics_service.clone();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = service.start().await {
                error!(error = %e, "Monitoring server exited");
            }
        }));

        // Let the listener bind before reporting readiness
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Refresh queue, session and health gauges every 30 seconds
    fn spawn_gauge_refresh(&mut self) {
        let matchmaker = self.matchmaker.clone();
        let collector = self.metrics_service.collector();
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            while *running.read().await {
                interval.tick().await;

                collector.update_uptime(matchmaker.uptime());
                collector.set_active_sessions(matchmaker.sessions().len());
                match matchmaker.queues().status() {
                    Ok(queues) => {
                        for queue in queues {
                            collector.set_queue_size(queue.mode, queue.size());
                        }
                    }
                    Err(e) => warn!(error = %e, "Queue gauges skipped"),
                }

                let status = HealthCheck::liveness_check(&matchmaker);
                collector.update_health_status(status.as_gauge());
                debug!(%status, "Gauges refreshed");
            }
        });
        self.tasks.push(task);
    }

    async fn abort_tasks(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let count = self.tasks.len();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        debug!(count, "Background tasks aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockNotifier;
    use crate::error::MatchError;
    use crate::storage::{InMemoryStore, MockSnapshotStore, StateDocument};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.enable_health_server = false;
        config.service.admin_ids = vec![1];
        config
    }

    #[tokio::test]
    async fn test_start_and_shutdown_saves_state() {
        let store = Arc::new(InMemoryStore::new());
        let mut app =
            AppState::with_components(test_config(), store.clone(), Arc::new(MockNotifier::new()))
                .unwrap();

        app.start().await.unwrap();
        assert!(app.is_running().await);

        app.shutdown().await.unwrap();
        assert!(!app.is_running().await);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_start_restores_counter() {
        let document = StateDocument {
            match_counter: 41,
            ..StateDocument::default()
        };
        let store = Arc::new(InMemoryStore::with_document(document));
        let mut app =
            AppState::with_components(test_config(), store, Arc::new(MockNotifier::new())).unwrap();

        app.start().await.unwrap();
        assert_eq!(app.matchmaker().sessions().counter(), 41);
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_survives_unreadable_state() {
        let mut store = MockSnapshotStore::new();
        store.expect_load().times(1).returning(|| {
            Err(MatchError::Persistence {
                message: "truncated document".to_string(),
            }
            .into())
        });
        store.expect_save().returning(|_| Ok(()));

        let mut app =
            AppState::with_components(test_config(), Arc::new(store), Arc::new(MockNotifier::new()))
                .unwrap();
        app.start().await.unwrap();
        assert!(app.is_running().await);
        assert_eq!(
            app.matchmaker().metrics().service().state_resets_total.get(),
            1
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_strict_start_refuses_unreadable_state() {
        let mut store = MockSnapshotStore::new();
        store.expect_load().times(1).returning(|| {
            Err(MatchError::Persistence {
                message: "truncated document".to_string(),
            }
            .into())
        });

        let mut config = test_config();
        config.storage.reset_on_corrupt = false;
        let mut app =
            AppState::with_components(config, Arc::new(store), Arc::new(MockNotifier::new())).unwrap();
        assert!(matches!(app.start().await, Err(ServiceError::Storage { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = test_config();
        config.draft.maps = vec!["dust2".to_string()];
        let result =
            AppState::with_components(config, Arc::new(InMemoryStore::new()), Arc::new(MockNotifier::new()));
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }
}
