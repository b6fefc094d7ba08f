//! Chat-facing surface
//!
//! Inbound text is parsed into commands and routed by the [`Dispatcher`];
//! outbound state is rendered into [`Notice`]s and handed to a [`Notifier`].

pub mod commands;
pub mod dispatch;
pub mod notifier;
pub mod render;

// Re-export commonly used types
pub use commands::{parse, Command};
pub use dispatch::Dispatcher;
pub use notifier::{Choice, LogNotifier, MockNotifier, Notice, Notifier};
