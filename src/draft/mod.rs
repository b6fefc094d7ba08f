//! Captain draft and map ban engine
//!
//! [`MatchSession`] holds the per-match state machine; [`SessionTable`] owns
//! the active sessions, each behind its own async mutex so that every action
//! on one match is serialized while different matches run in parallel.

pub mod session;
pub mod table;

// Re-export commonly used types
pub use session::{BanOutcome, DraftChoice, DraftEvent, MatchSession, PickOutcome};
pub use table::{SessionHandle, SessionSummary, SessionTable};
