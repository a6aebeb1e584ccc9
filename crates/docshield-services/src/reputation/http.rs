//! Hash-lookup reputation provider over HTTP.
//!
//! Speaks the `GET {base_url}/files/{sha256}` shape with an `x-apikey`
//! header. A 404 means the provider has never seen the file.

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::{ReputationService, ReputationVerdict};

#[derive(Clone)]
pub struct HttpReputation {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct FileReport {
    data: FileData,
}

#[derive(Debug, Deserialize)]
struct FileData {
    attributes: FileAttributes,
}

#[derive(Debug, Deserialize)]
struct FileAttributes {
    #[serde(default)]
    last_analysis_stats: AnalysisStats,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisStats {
    #[serde(default)]
    harmless: u32,
    #[serde(default)]
    malicious: u32,
    #[serde(default)]
    suspicious: u32,
    #[serde(default)]
    undetected: u32,
}

impl AnalysisStats {
    fn verdict(&self) -> ReputationVerdict {
        if self.malicious > 0 || self.suspicious > 0 {
            ReputationVerdict::Unsafe {
                reason: format!(
                    "{} malicious, {} suspicious detections",
                    self.malicious, self.suspicious
                ),
            }
        } else if self.harmless + self.undetected > 0 {
            ReputationVerdict::Safe
        } else {
            ReputationVerdict::Unknown
        }
    }
}

impl HttpReputation {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build reputation HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ReputationService for HttpReputation {
    async fn lookup(&self, sha256: &str, _data: &[u8]) -> anyhow::Result<ReputationVerdict> {
        let start = Instant::now();
        let url = format!("{}/files/{}", self.base_url, sha256);

        let response = self
            .client
            .get(&url)
            .header("x-apikey", &self.api_key)
            .send()
            .await
            .context("Reputation lookup request failed")?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!(
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Hash unknown to reputation provider"
            );
            return Ok(ReputationVerdict::Unknown);
        }
        if !status.is_success() {
            bail!("Reputation provider returned {}", status);
        }

        let report: FileReport = response
            .json()
            .await
            .context("Failed to parse reputation report")?;
        let verdict = report.data.attributes.last_analysis_stats.verdict();
        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            verdict = ?verdict,
            "Reputation lookup completed"
        );
        Ok(verdict)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
