//! DocShield Infrastructure Library
//!
//! Shared plumbing used by the services and the CLI:
//! - Telemetry initialization (tracing subscriber, text or JSON output)
//! - Per-document mutation locks

pub mod locks;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
pub use locks::{DocumentGuard, DocumentLocks};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat};
