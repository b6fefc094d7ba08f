//! Configuration management for the draft-room service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and the defaults of the fixed configuration surface.

pub mod app;
pub mod draft;
pub mod queue;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings, StorageSettings};
pub use draft::DraftConfig;
pub use queue::QueueConfig;
pub use rating::RatingConfig;
