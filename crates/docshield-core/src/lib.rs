//! DocShield Core Library
//!
//! Domain models, error types, configuration and validation shared by every
//! DocShield component.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{
    AccessConfig, Config, PatternConfig, RedactionConfig, ReputationConfig, ReputationProvider,
    StorageConfig, UploadConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
