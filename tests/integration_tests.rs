//! Integration tests for the draft-room service
//!
//! These tests drive the whole system through the matchmaker and the
//! command dispatcher:
//! - queue fill, captain draft, map bans and rating updates
//! - moderation and the access gate
//! - simulated captains and practice matches
//! - snapshot persistence and restart

mod fixtures;

use draft_room::config::AppConfig;
use draft_room::moderation::RestrictionSpan;
use draft_room::queue::JoinOutcome;
use draft_room::storage::{InMemoryStore, JsonFileStore, SnapshotStore};
use draft_room::types::{MatchId, Mode, Phase, RestrictionKind, Side};
use draft_room::utils::Clock;
use fixtures::{err_kind, test_config, FailingStore, TestSystem, ADMIN};
use futures::future::join_all;
use std::sync::Arc;

fn current_match(system: &TestSystem) -> MatchId {
    MatchId(system.matchmaker.sessions().counter())
}

#[tokio::test]
async fn test_complete_5v5_workflow() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register(100..110).await;

    // Step 1: nine players wait
    for id in 100..109 {
        match mm.join_queue(id, Mode::FiveVsFive, 5).await.unwrap() {
            JoinOutcome::Queued { size, capacity, .. } => {
                assert_eq!(size as i64, id - 99);
                assert_eq!(capacity, 10);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    // Step 2: the tenth join starts the match
    let outcome = mm.join_queue(109, Mode::FiveVsFive, 5).await.unwrap();
    let JoinOutcome::Filled { roster, .. } = outcome else {
        panic!("queue did not fill");
    };
    assert_eq!(roster, (100..110).collect::<Vec<_>>());
    assert!(mm.queues().snapshot(Mode::FiveVsFive).unwrap().members.is_empty());

    let id = current_match(&system);
    let session = system.session(id).await;
    assert_eq!(session.pool.len(), 8);
    assert_eq!(session.turn, session.ct_captain);
    let announcement = system.notifier.last_containing("🆕 Match #1").unwrap();
    assert_eq!(announcement.channel, 5);
    assert!(announcement.choices[0].token.starts_with("pk_1_"));

    // Step 3: a wrong-turn pick is refused, naming the captain to act
    let err = mm
        .pick(session.t_captain, id, session.pool[0])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Not your turn, it is Player{}'s turn", session.ct_captain)
    );
    assert_eq!(err_kind(err), "invalid_turn");
    assert_eq!(system.session(id).await.pool.len(), 8);

    // Step 4: seven picks, the last pool member is auto-assigned
    system.play_draft(id).await;
    let session = system.session(id).await;
    assert_eq!(session.phase, Phase::Banning);
    assert_eq!(session.ct_roster.len(), 5);
    assert_eq!(session.t_roster.len(), 5);
    assert_eq!(session.banned_maps.len(), 6);
    let final_map = session.final_map().unwrap().to_string();
    assert!(system
        .notifier
        .last_containing("Ready to play")
        .unwrap()
        .text
        .contains(&final_map));

    // Step 5: the result moves every rating by the fixed deltas
    let result = mm.record_result(ADMIN, id, Side::T).await.unwrap();
    assert_eq!(result.final_map.as_deref(), Some(final_map.as_str()));
    assert_eq!(result.changes.len(), 10);
    for winner in &session.t_roster {
        let profile = mm.registry().get(*winner).unwrap().unwrap();
        assert_eq!(profile.rating, 1025);
        assert_eq!(profile.wins, 1);
    }
    for loser in &session.ct_roster {
        let profile = mm.registry().get(*loser).unwrap().unwrap();
        assert_eq!(profile.rating, 980);
        assert_eq!(profile.losses, 1);
    }
    assert!(mm.sessions().is_empty());
}

#[tokio::test]
async fn test_2v2_needs_a_single_pick() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register(200..204).await;
    for id in 200..204 {
        mm.join_queue(id, Mode::TwoVsTwo, 0).await.unwrap();
    }

    let id = current_match(&system);
    let session = system.session(id).await;
    let outcome = mm
        .pick(session.ct_captain, id, session.pool[1])
        .await
        .unwrap();

    assert!(outcome.pick_phase_complete);
    assert_eq!(outcome.auto_assigned, Some((session.pool[0], Side::T)));
    let session = system.session(id).await;
    assert_eq!(session.phase, Phase::Banning);
    assert_eq!(session.turn, session.ct_captain);
}

#[tokio::test]
async fn test_queue_membership_rules() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register([300, 301]).await;

    mm.join_queue(300, Mode::FiveVsFive, 0).await.unwrap();
    assert_eq!(
        err_kind(mm.join_queue(300, Mode::FiveVsFive, 0).await.unwrap_err()),
        "already_queued"
    );
    assert_eq!(
        err_kind(mm.join_queue(300, Mode::TwoVsTwo, 0).await.unwrap_err()),
        "cross_mode_conflict"
    );

    assert_eq!(mm.leave_queue(300, Mode::FiveVsFive).await.unwrap(), 0);
    assert_eq!(
        err_kind(mm.leave_queue(300, Mode::FiveVsFive).await.unwrap_err()),
        "not_in_queue"
    );

    // after leaving, the other mode is open
    mm.join_queue(300, Mode::TwoVsTwo, 0).await.unwrap();
    let status = mm.queue_status(301).unwrap();
    assert_eq!(status[0].mode, Mode::FiveVsFive);
    assert_eq!(status[1].members, vec![300]);
}

#[tokio::test]
async fn test_mute_blocks_only_queue_joins() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register([400]).await;

    let until = mm
        .restrict(ADMIN, 400, RestrictionKind::Mute, RestrictionSpan::Seconds(7200))
        .await
        .unwrap();
    assert_eq!((until - system.clock.now()).num_seconds(), 7200);

    assert_eq!(
        err_kind(mm.join_queue(400, Mode::FiveVsFive, 0).await.unwrap_err()),
        "muted"
    );
    // muted players can still read
    assert!(mm.stats(400, None).is_ok());
    assert!(mm.queue_status(400).is_ok());

    system.clock.advance(chrono::Duration::seconds(7201));
    mm.join_queue(400, Mode::FiveVsFive, 0).await.unwrap();
}

#[tokio::test]
async fn test_ban_blocks_everything_until_lifted() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register([500]).await;

    mm.restrict(ADMIN, 500, RestrictionKind::Ban, RestrictionSpan::Permanent)
        .await
        .unwrap();
    assert_eq!(err_kind(mm.stats(500, None).unwrap_err()), "banned");
    assert_eq!(
        err_kind(mm.register(500, "again", "Again").await.unwrap_err()),
        "banned"
    );

    system.clock.advance(chrono::Duration::days(365));
    assert_eq!(err_kind(mm.stats(500, None).unwrap_err()), "banned");

    assert!(mm.lift(ADMIN, 500, RestrictionKind::Ban).await.unwrap());
    assert!(!mm.lift(ADMIN, 500, RestrictionKind::Ban).await.unwrap());
    assert!(mm.stats(500, None).is_ok());
}

#[tokio::test]
async fn test_fully_simulated_match() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;

    let id = mm
        .start_simulated(ADMIN, Mode::FiveVsFive, 9)
        .await
        .unwrap();
    let steps = mm.wait_for_autoplay().await;
    assert_eq!(steps, 13);

    let session = system.session(id).await;
    assert!(session.is_ready_for_result());
    assert!(session.participants().iter().all(|p| *p < 0));
    assert!(system.notifier.last_containing("Ready to play").is_some());

    let result = mm.record_result(ADMIN, id, Side::Ct).await.unwrap();
    assert!(result.changes.is_empty());
    let (top, ranked) = mm.leaderboard(ADMIN, 10).unwrap();
    assert!(top.is_empty());
    assert_eq!(ranked, 0);
}

#[tokio::test]
async fn test_practice_match_mixes_caller_and_simulated() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register([ADMIN]).await;
    mm.join_queue(ADMIN, Mode::TwoVsTwo, 0).await.unwrap();

    let id = mm.start_practice(ADMIN, Mode::FiveVsFive, 0).await.unwrap();
    assert_eq!(mm.queues().queued_mode(ADMIN).unwrap(), None);

    system.play_draft(id).await;
    let session = system.session(id).await;
    assert!(session.is_ready_for_result());
    assert_eq!(session.participants().len(), 10);
    assert_eq!(session.participants().iter().filter(|p| **p > 0).count(), 1);

    // only the caller is rated
    let result = mm.record_result(ADMIN, id, Side::Ct).await.unwrap();
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].player_id, ADMIN);
}

#[tokio::test]
async fn test_non_admin_cannot_run_admin_operations() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register([600]).await;

    assert_eq!(
        err_kind(mm.start_practice(600, Mode::TwoVsTwo, 0).await.unwrap_err()),
        "permission_denied"
    );
    assert_eq!(
        err_kind(mm.set_rating(600, 600, 3000).await.unwrap_err()),
        "permission_denied"
    );
    assert_eq!(
        err_kind(mm.clear_queue(600, None).await.unwrap_err()),
        "permission_denied"
    );
    assert_eq!(
        err_kind(mm.list_sessions(600).await.unwrap_err()),
        "permission_denied"
    );
}

#[tokio::test]
async fn test_rating_floor_applies_to_overrides_and_losses() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register(700..704).await;

    let change = mm.set_rating(ADMIN, 700, 20).await.unwrap();
    assert_eq!(change.new_rating, 100);
    assert_eq!(
        err_kind(mm.set_rating(ADMIN, 999, 1200).await.unwrap_err()),
        "not_registered"
    );

    for id in 700..704 {
        mm.join_queue(id, Mode::TwoVsTwo, 0).await.unwrap();
    }
    let id = current_match(&system);
    system.play_draft(id).await;
    let session = system.session(id).await;
    let losing = if session.ct_roster.contains(&700) {
        Side::Ct
    } else {
        Side::T
    };

    mm.record_result(ADMIN, id, losing.opponent()).await.unwrap();
    assert_eq!(mm.registry().get(700).unwrap().unwrap().rating, 100);
}

#[tokio::test]
async fn test_pick_timeout_cancels_match() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register(800..804).await;
    for id in 800..804 {
        mm.join_queue(id, Mode::TwoVsTwo, 3).await.unwrap();
    }
    let id = current_match(&system);
    let session = system.session(id).await;

    system.clock.advance(chrono::Duration::seconds(61));
    let err = mm
        .pick(session.ct_captain, id, session.pool[0])
        .await
        .unwrap_err();
    assert_eq!(err_kind(err), "timeout");
    assert!(mm.sessions().is_empty());

    let notice = system.notifier.last_containing("Pick time ran out").unwrap();
    assert_eq!(notice.channel, 3);

    // nobody was rated and the players may queue again
    assert_eq!(mm.registry().get(800).unwrap().unwrap().rating, 1000);
    mm.join_queue(800, Mode::TwoVsTwo, 3).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_joins_form_disjoint_matches() {
    let system = TestSystem::new();
    let mm = system.matchmaker.clone();
    system.register(1000..1025).await;

    let joins = (1000..1025).map(|id| {
        let mm = mm.clone();
        tokio::spawn(async move { mm.join_queue(id, Mode::FiveVsFive, 0).await })
    });
    let outcomes: Vec<JoinOutcome> = join_all(joins)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let filled: Vec<&Vec<i64>> = outcomes
        .iter()
        .filter_map(|o| match o {
            JoinOutcome::Filled { roster, .. } => Some(roster),
            _ => None,
        })
        .collect();
    assert_eq!(filled.len(), 2);
    assert_eq!(mm.sessions().len(), 2);

    let waiting = mm.queues().snapshot(Mode::FiveVsFive).unwrap().members;
    assert_eq!(waiting.len(), 5);

    let mut everyone: Vec<i64> = filled.iter().flat_map(|r| r.iter().copied()).collect();
    everyone.extend(&waiting);
    everyone.sort_unstable();
    assert_eq!(everyone, (1000..1025).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let first = TestSystem::with_store(Arc::new(JsonFileStore::new(&path)));
    first.register(1100..1105).await;
    for id in 1100..1104 {
        first
            .matchmaker
            .join_queue(id, Mode::TwoVsTwo, 0)
            .await
            .unwrap();
    }
    first
        .matchmaker
        .join_queue(1104, Mode::FiveVsFive, 0)
        .await
        .unwrap();
    first
        .matchmaker
        .restrict(ADMIN, 1104, RestrictionKind::Mute, RestrictionSpan::Seconds(600))
        .await
        .unwrap();
    let before = first.matchmaker.snapshot().await.unwrap();

    let second = TestSystem::with_store(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(second.matchmaker.load_state().await.unwrap(), 1);
    let after = second.matchmaker.snapshot().await.unwrap();
    assert_eq!(after.players, before.players);
    assert_eq!(after.queues, before.queues);
    assert_eq!(after.sessions, before.sessions);
    assert_eq!(after.moderation, before.moderation);

    // the restored match is playable and new ids continue after it
    second.play_draft(MatchId(1)).await;
    second
        .matchmaker
        .record_result(ADMIN, MatchId(1), Side::Ct)
        .await
        .unwrap();
    let id = second
        .matchmaker
        .start_simulated(ADMIN, Mode::TwoVsTwo, 0)
        .await
        .unwrap();
    assert_eq!(id, MatchId(2));
}

#[tokio::test]
async fn test_corrupt_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();

    let lenient = TestSystem::with_store(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(lenient.matchmaker.load_state().await.unwrap(), 0);
    assert!(lenient.matchmaker.sessions().is_empty());
    assert_eq!(
        lenient
            .matchmaker
            .metrics()
            .service()
            .state_resets_total
            .get(),
        1
    );

    let mut config = test_config();
    config.storage.reset_on_corrupt = false;
    let strict = TestSystem::with_config(config, Arc::new(JsonFileStore::new(&path)));
    let err = strict.matchmaker.load_state().await.unwrap_err();
    assert_eq!(err_kind(err), "persistence");
}

#[tokio::test]
async fn test_failed_saves_do_not_fail_operations() {
    let store = Arc::new(FailingStore::default());
    let system = TestSystem::with_store(store.clone());
    let mm = &system.matchmaker;

    system.register([1200]).await;
    mm.join_queue(1200, Mode::FiveVsFive, 0).await.unwrap();
    assert!(store.attempts() >= 2);
    assert!(mm.save().await.is_err());
}

#[tokio::test]
async fn test_dispatcher_drives_a_draft_with_tokens() {
    let system = TestSystem::new();
    let d = &system.dispatcher;
    for id in 1300..1304 {
        let reply = d
            .handle(id, 0, &format!("/reg ext{} Player{}", id, id))
            .await;
        assert!(reply.text.starts_with("✅ Registered"), "{}", reply.text);
    }
    for id in 1300..1304 {
        let lobby = d.handle(id, 0, "/play2").await;
        let token = lobby.token_for("Join").unwrap().to_string();
        d.handle(id, 0, &token).await;
    }

    let id = current_match(&system);
    // follow the choices attached to the latest broadcast until the map is set
    loop {
        let session = system.session(id).await;
        if session.is_ready_for_result() {
            break;
        }
        let notice = system
            .notifier
            .notices()
            .into_iter()
            .rev()
            .find(|n| !n.choices.is_empty())
            .unwrap();
        let reply = d.handle(session.turn, 0, &notice.choices[0].token).await;
        assert!(reply.text.starts_with("✅"), "{}", reply.text);
    }

    let reply = d.handle(1300, 0, &format!("/win {} ct", id)).await;
    assert!(reply.text.starts_with("🚫"));
    let reply = d.handle(ADMIN, 0, &format!("/win {} ct", id)).await;
    assert!(reply.text.contains("ratings changed"), "{}", reply.text);

    let top = d.handle(1300, 0, "/top").await;
    assert!(top.text.contains("Player1300"), "{}", top.text);
}

#[tokio::test]
async fn test_clear_queue_keeps_profiles() {
    let system = TestSystem::new();
    let mm = &system.matchmaker;
    system.register([1400, 1401]).await;
    mm.join_queue(1400, Mode::FiveVsFive, 0).await.unwrap();
    mm.join_queue(1401, Mode::TwoVsTwo, 0).await.unwrap();

    let removed = mm.clear_queue(ADMIN, Some(Mode::TwoVsTwo)).await.unwrap();
    assert_eq!(removed, vec![1401]);
    assert_eq!(mm.queues().queued_mode(1400).unwrap(), Some(Mode::FiveVsFive));

    mm.clear_queue(ADMIN, None).await.unwrap();
    assert!(mm.queues().status().unwrap().iter().all(|q| q.members.is_empty()));
    assert!(mm.registry().get(1401).unwrap().unwrap().is_registered());
}

#[tokio::test]
async fn test_empty_store_starts_clean() {
    let store: Arc<dyn SnapshotStore> = Arc::new(InMemoryStore::new());
    let system = TestSystem::with_config(AppConfig::default(), store);
    assert_eq!(system.matchmaker.load_state().await.unwrap(), 0);
    assert!(system.matchmaker.sessions().is_empty());
}
