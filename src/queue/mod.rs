//! Matchmaking queues
//!
//! One ordered queue per mode. A join that brings a queue to capacity drains
//! it in the same critical section and hands the roster back to the caller.

pub mod manager;
pub mod state;

// Re-export commonly used types
pub use manager::{JoinOutcome, QueueManager};
pub use state::{QueueSnapshot, QueueState};
