//! Player profiles
//!
//! The registry owns every known profile, real or simulated. Profiles are
//! created lazily on first reference or by registration and are never removed.

pub mod registry;

pub use registry::{PlayerRegistry, MAX_DISPLAY_NAME_LEN};
