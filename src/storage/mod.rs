//! Snapshot persistence
//!
//! The whole service state is saved and loaded as one versioned document.

pub mod document;
pub mod store;

// Re-export commonly used types
pub use document::{migrate, StateDocument, SCHEMA_VERSION};
pub use store::{InMemoryStore, JsonFileStore, SnapshotStore};

#[cfg(test)]
pub use store::MockSnapshotStore;
