use anyhow::Context;
use async_trait::async_trait;
use clamav_client::{clean, Tcp};
use std::str;
use std::time::Instant;

use super::{ReputationService, ReputationVerdict};

/// Scans document bytes with a clamd daemon over TCP.
#[derive(Clone)]
pub struct ClamAvReputation {
    host: String,
    port: u16,
}

impl ClamAvReputation {
    /// # Arguments
    /// * `host` - ClamAV daemon hostname
    /// * `port` - ClamAV daemon port (typically 3310)
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

/// Signature name from a clamd `stream: Eicar-Signature FOUND` reply.
fn signature_name(response: &[u8]) -> String {
    let response = str::from_utf8(response).map(str::trim).unwrap_or("");
    if !response.contains("FOUND") {
        return "unknown".to_string();
    }
    response
        .split(':')
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("unknown")
        .to_string()
}

#[async_trait]
impl ReputationService for ClamAvReputation {
    /// Uses the sync client inside spawn_blocking to avoid !Send futures.
    /// The caller applies the timeout.
    async fn lookup(&self, _sha256: &str, data: &[u8]) -> anyhow::Result<ReputationVerdict> {
        let start = Instant::now();
        tracing::debug!(host = %self.host, port = %self.port, "Starting ClamAV scan");
        let data = data.to_vec();
        let address = format!("{}:{}", self.host, self.port);

        let response = tokio::task::spawn_blocking(move || {
            let connection = Tcp {
                host_address: address.as_str(),
            };
            clamav_client::scan_buffer(data.as_slice(), connection, None)
        })
        .await
        .context("ClamAV scan task failed")?
        .context("ClamAV scan error")?;

        let is_clean = clean(&response).context("Failed to parse ClamAV response")?;
        if is_clean {
            tracing::info!(
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "ClamAV scan completed: clean"
            );
            return Ok(ReputationVerdict::Safe);
        }

        let signature = signature_name(&response);
        tracing::warn!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            signature = %signature,
            "ClamAV scan detected a threat"
        );
        Ok(ReputationVerdict::Unsafe { reason: signature })
    }

    fn name(&self) -> &'static str {
        "clamav"
    }
}
