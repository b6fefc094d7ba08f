//! Per-mode queue state

use crate::types::{Mode, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ordered membership of one mode's queue. Join order is insertion order.
#[derive(Debug, Clone)]
pub struct QueueState {
    mode: Mode,
    capacity: usize,
    members: VecDeque<PlayerId>,
}

/// Read-only projection of a queue for display and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub mode: Mode,
    pub capacity: usize,
    pub members: Vec<PlayerId>,
}

impl QueueSnapshot {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

impl QueueState {
    pub fn new(mode: Mode, capacity: usize) -> Self {
        Self {
            mode,
            capacity,
            members: VecDeque::with_capacity(capacity),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.members.contains(&id)
    }

    /// Append at the tail. Callers check membership and capacity first.
    pub(crate) fn push(&mut self, id: PlayerId) {
        self.members.push_back(id);
    }

    /// Remove a member, returning whether it was present
    pub fn remove(&mut self, id: PlayerId) -> bool {
        match self.members.iter().position(|m| *m == id) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take the `capacity` oldest members, if that many are queued
    pub(crate) fn drain_full(&mut self) -> Option<Vec<PlayerId>> {
        if self.members.len() < self.capacity {
            return None;
        }
        Some(self.members.drain(..self.capacity).collect())
    }

    /// Empty the queue, returning the removed members in join order
    pub fn clear(&mut self) -> Vec<PlayerId> {
        self.members.drain(..).collect()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            mode: self.mode,
            capacity: self.capacity,
            members: self.members.iter().copied().collect(),
        }
    }
}
