//! Moderation: time-bounded mutes and bans, and the access gate built on them

pub mod gate;
pub mod ledger;

pub use gate::{AccessGate, GatedAction};
pub use ledger::{ModerationLedger, ModerationRecord, RestrictionSpan, PERMANENT_EXPIRY_SECONDS};
