//! Reputation gate: hash the bytes, ask a reputation provider, and combine
//! the verdict with the structural validator's findings.

#[cfg(feature = "clamav")]
pub mod clamav;
pub mod gate;
#[cfg(feature = "http-reputation")]
pub mod http;

use async_trait::async_trait;
use serde::Serialize;

#[cfg(feature = "clamav")]
pub use clamav::ClamAvReputation;
pub use gate::{GateScan, ReputationGate};
#[cfg(feature = "http-reputation")]
pub use http::HttpReputation;

/// What a provider knows about a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ReputationVerdict {
    Safe,
    /// `reason` may name a signature; it is logged, never shown to clients.
    Unsafe { reason: String },
    /// The provider has never seen the file.
    Unknown,
}

#[async_trait]
pub trait ReputationService: Send + Sync {
    /// Look up a file by its lowercase hex SHA-256. Providers that scan
    /// content instead of looking up hashes use `data`.
    async fn lookup(&self, sha256: &str, data: &[u8]) -> anyhow::Result<ReputationVerdict>;

    fn name(&self) -> &'static str;
}
