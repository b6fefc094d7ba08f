//! Service layer for the draft-room service
//!
//! The matchmaker core, the application state that runs it, and health
//! reporting.

pub mod app;
pub mod health;
pub mod matchmaker;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use matchmaker::Matchmaker;
