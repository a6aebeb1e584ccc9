//! DocShield Storage Library
//!
//! Byte storage for documents behind the `Storage` trait, with S3, local
//! filesystem and in-memory backends.
//!
//! # Storage key format
//!
//! Every backend uses the same layout: `documents/{owner_id}/{document_id}.{ext}`.
//! Keys must not contain `..` or a leading `/`. Key generation and checking are
//! centralized in the `keys` module so all backends stay consistent.
//!
//! # Replacement
//!
//! `put` on an existing key replaces the object atomically: readers observe
//! either the previous bytes or the new bytes, never a partial write.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use docshield_core::StorageBackend;
pub use factory::create_storage;
pub use keys::document_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
