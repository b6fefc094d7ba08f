//! Test fixtures for integration testing
#![allow(dead_code)]

use async_trait::async_trait;
use draft_room::bot::RandomRosterProvider;
use draft_room::config::AppConfig;
use draft_room::draft::MatchSession;
use draft_room::error::{match_error, MatchError, Result};
use draft_room::gateway::{Dispatcher, MockNotifier};
use draft_room::metrics::MetricsCollector;
use draft_room::service::Matchmaker;
use draft_room::storage::{InMemoryStore, SnapshotStore, StateDocument};
use draft_room::types::{MatchId, Phase, PlayerId};
use draft_room::utils::ManualClock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Administrator identity used by every test system
pub const ADMIN: PlayerId = 1;

/// Configuration with one admin and no autoplay delay
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.service.admin_ids = vec![ADMIN];
    config.service.enable_health_server = false;
    config.draft.autoplay_delay_ms = 0;
    config
}

/// A complete service wired to in-memory collaborators
pub struct TestSystem {
    pub matchmaker: Arc<Matchmaker>,
    pub dispatcher: Dispatcher,
    pub notifier: Arc<MockNotifier>,
    pub clock: Arc<ManualClock>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn SnapshotStore>) -> Self {
        Self::with_config(test_config(), store)
    }

    pub fn with_config(config: AppConfig, store: Arc<dyn SnapshotStore>) -> Self {
        let notifier = Arc::new(MockNotifier::new());
        let clock = Arc::new(ManualClock::default());
        let matchmaker = Arc::new(
            Matchmaker::new(
                config,
                notifier.clone(),
                store,
                Arc::new(MetricsCollector::new().expect("metrics collector")),
            )
            .with_clock(clock.clone())
            .with_roster_provider(Arc::new(RandomRosterProvider::seeded(7)))
            .with_seed(42),
        );

        Self {
            dispatcher: Dispatcher::new(matchmaker.clone()),
            matchmaker,
            notifier,
            clock,
        }
    }

    /// Register players `ids` as `ext<id>` / `Player<id>`
    pub async fn register(&self, ids: impl IntoIterator<Item = PlayerId>) {
        for id in ids {
            self.matchmaker
                .register(id, &format!("ext{}", id), &format!("Player{}", id))
                .await
                .expect("registration");
        }
    }

    /// Copy of a live session
    pub async fn session(&self, id: MatchId) -> MatchSession {
        let handle = self.matchmaker.sessions().get(id).expect("live session");
        let session = handle.lock().await.clone();
        session
    }

    /// Play every remaining human turn, picking the first pool member and
    /// banning the first map, until the map is decided
    pub async fn play_draft(&self, id: MatchId) {
        loop {
            self.matchmaker.wait_for_autoplay().await;
            let session = self.session(id).await;
            if session.is_ready_for_result() {
                return;
            }
            match session.phase {
                Phase::Picking => {
                    self.matchmaker
                        .pick(session.turn, id, session.pool[0])
                        .await
                        .expect("pick");
                }
                Phase::Banning => {
                    self.matchmaker
                        .ban(session.turn, id, &session.maps[0])
                        .await
                        .expect("ban");
                }
            }
        }
    }
}

/// Kind string of a `MatchError` carried by `err`
pub fn err_kind(err: anyhow::Error) -> &'static str {
    match_error(&err)
        .map(MatchError::kind)
        .unwrap_or("not a match error")
}

/// Store whose saves always fail
#[derive(Debug, Default)]
pub struct FailingStore {
    pub attempts: AtomicU64,
}

impl FailingStore {
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn load(&self) -> Result<Option<StateDocument>> {
        Ok(None)
    }

    async fn save(&self, _document: &StateDocument) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MatchError::Persistence {
            message: "disk full".to_string(),
        }
        .into())
    }
}
