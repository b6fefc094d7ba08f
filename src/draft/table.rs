//! Active session table

use crate::draft::session::MatchSession;
use crate::error::{MatchError, Result};
use crate::types::{MatchId, Mode, Phase, PlayerId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Shared handle to one session; hold the lock for the whole read-modify-write
pub type SessionHandle = Arc<tokio::sync::Mutex<MatchSession>>;

/// Admin listing row for an active session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: MatchId,
    pub mode: Mode,
    pub ct_captain: PlayerId,
    pub t_captain: PlayerId,
    pub phase: Phase,
    pub pool_size: usize,
    pub ready_for_result: bool,
}

impl From<&MatchSession> for SessionSummary {
    fn from(session: &MatchSession) -> Self {
        Self {
            id: session.id,
            mode: session.mode,
            ct_captain: session.ct_captain,
            t_captain: session.t_captain,
            phase: session.phase,
            pool_size: session.pool.len(),
            ready_for_result: session.is_ready_for_result(),
        }
    }
}

/// Match id → session, plus the monotonic match counter
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<MatchId, SessionHandle>>,
    counter: AtomicU64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next match id
    pub fn next_id(&self) -> MatchId {
        MatchId(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Highest match id handed out so far
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn insert(&self, session: MatchSession) -> Result<SessionHandle> {
        let id = session.id;
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| MatchError::lock("sessions"))?;
        sessions.insert(id, handle.clone());
        debug!("Session {} registered ({} active)", id, sessions.len());
        Ok(handle)
    }

    pub fn get(&self, id: MatchId) -> Result<SessionHandle> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| MatchError::lock("sessions"))?;
        sessions.get(&id).cloned().ok_or_else(|| {
            MatchError::SessionNotFound {
                match_id: id.to_string(),
            }
            .into()
        })
    }

    /// Detach a session. Whoever gets `Some` owns its termination.
    pub fn remove(&self, id: MatchId) -> Result<Option<SessionHandle>> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| MatchError::lock("sessions"))?;
        let removed = sessions.remove(&id);
        if removed.is_some() {
            info!("Session {} closed ({} active)", id, sessions.len());
        }
        Ok(removed)
    }

    /// Remove a session only if `handle` is still the one registered under `id`
    pub fn remove_handle(&self, id: MatchId, handle: &SessionHandle) -> Result<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| MatchError::lock("sessions"))?;
        match sessions.get(&id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                sessions.remove(&id);
                info!("Session {} closed ({} active)", id, sessions.len());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active handles ordered by match id
    pub fn handles(&self) -> Result<Vec<(MatchId, SessionHandle)>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| MatchError::lock("sessions"))?;
        let mut handles: Vec<(MatchId, SessionHandle)> = sessions
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);
        Ok(handles)
    }

    /// Copies of every session, taking each session's lock in turn
    pub async fn snapshot(&self) -> Result<Vec<MatchSession>> {
        let handles = self.handles()?;
        let mut sessions = Vec::with_capacity(handles.len());
        for (_, handle) in handles {
            sessions.push(handle.lock().await.clone());
        }
        Ok(sessions)
    }

    pub async fn summaries(&self) -> Result<Vec<SessionSummary>> {
        let handles = self.handles()?;
        let mut rows = Vec::with_capacity(handles.len());
        for (_, handle) in handles {
            rows.push(SessionSummary::from(&*handle.lock().await));
        }
        Ok(rows)
    }

    /// Replace the table with restored sessions and counter.
    ///
    /// The counter never moves below the highest restored id.
    pub fn restore(&self, restored: Vec<MatchSession>, counter: u64) -> Result<()> {
        let highest = restored.iter().map(|s| s.id.0).max().unwrap_or(0);
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| MatchError::lock("sessions"))?;
        sessions.clear();
        for session in restored {
            sessions.insert(session.id, Arc::new(tokio::sync::Mutex::new(session)));
        }
        self.counter.store(counter.max(highest), Ordering::SeqCst);
        Ok(())
    }
}
