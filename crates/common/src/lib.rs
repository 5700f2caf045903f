//! Cameraman Common Utilities
//!
//! Shared infrastructure for all Cameraman crates:
//! - Error types and result aliases
//! - Recording clock with monotonic and wall-clock anchors
//! - Tracing/logging initialization
//! - Configuration loading and validation

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
