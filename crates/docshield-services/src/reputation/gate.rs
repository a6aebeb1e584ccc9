use docshield_core::models::{ValidationReport, VirusScanSummary};
use docshield_core::{AppError, ReputationConfig, ReputationProvider};
use docshield_processing::StructuralValidator;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{ReputationService, ReputationVerdict};

/// Combined verdict of the structural validator and the reputation provider.
#[derive(Debug, Clone, Serialize)]
pub struct GateScan {
    /// SHA-256 of the scanned bytes, lowercase hex
    pub hash: String,
    pub safe: bool,
    /// Safe and not encrypted: redaction and text extraction may run
    pub can_process: bool,
    pub message: String,
    pub validation: ValidationReport,
    pub virus_scan: VirusScanSummary,
}

pub struct ReputationGate {
    service: Option<Arc<dyn ReputationService>>,
    validator: StructuralValidator,
    timeout: Duration,
    block_active_content: bool,
    block_embedded_files: bool,
    allow_encrypted: bool,
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

impl ReputationGate {
    /// `service` is `None` when reputation scanning is disabled.
    pub fn new(service: Option<Arc<dyn ReputationService>>, config: &ReputationConfig) -> Self {
        Self {
            service,
            validator: StructuralValidator::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            block_active_content: config.block_active_content,
            block_embedded_files: config.block_embedded_files,
            allow_encrypted: config.allow_encrypted,
        }
    }

    /// Build the gate with the provider named in the configuration.
    pub fn from_config(config: &ReputationConfig) -> Result<Self, AppError> {
        let service: Option<Arc<dyn ReputationService>> = match &config.provider {
            ReputationProvider::Disabled => None,
            #[cfg(feature = "clamav")]
            ReputationProvider::ClamAv { host, port } => Some(Arc::new(
                super::ClamAvReputation::new(host.clone(), *port),
            )),
            #[cfg(feature = "http-reputation")]
            ReputationProvider::Http { base_url, api_key } => {
                Some(Arc::new(super::HttpReputation::new(
                    base_url.clone(),
                    api_key.clone(),
                    Duration::from_secs(config.timeout_secs),
                )?))
            }
            #[allow(unreachable_patterns)]
            _ => {
                return Err(AppError::Internal(
                    "Configured reputation provider is not compiled in".to_string(),
                ))
            }
        };
        Ok(Self::new(service, config))
    }

    pub fn is_enabled(&self) -> bool {
        self.service.is_some()
    }

    /// One provider lookup under the gate's timeout. Any failure, including
    /// the timeout, is `ReputationUnavailable`.
    pub async fn lookup(&self, hash: &str, data: &[u8]) -> Result<ReputationVerdict, AppError> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| AppError::ReputationUnavailable("scanning disabled".to_string()))?;

        match tokio::time::timeout(self.timeout, service.lookup(hash, data)).await {
            Ok(Ok(verdict)) => Ok(verdict),
            Ok(Err(e)) => Err(AppError::ReputationUnavailable(format!(
                "{}: {:#}",
                service.name(),
                e
            ))),
            Err(_) => Err(AppError::ReputationUnavailable(format!(
                "{} timed out after {} seconds",
                service.name(),
                self.timeout.as_secs()
            ))),
        }
    }

    /// Scan bytes before they are stored.
    ///
    /// Never returns an error: a provider that fails, times out or does not
    /// know the file yields an unsafe verdict.
    pub async fn scan(&self, data: &[u8], filename: &str) -> GateScan {
        self.run(data, filename, None).await
    }

    /// Like `scan`, and a declared MIME type that disagrees with the bytes
    /// makes the document unsafe.
    pub async fn scan_declared(&self, data: &[u8], filename: &str, declared_mime: &str) -> GateScan {
        self.run(data, filename, Some(declared_mime)).await
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn run(&self, data: &[u8], filename: &str, declared_mime: Option<&str>) -> GateScan {
        let start = Instant::now();
        let hash = sha256_hex(data);
        let mut validation = match declared_mime {
            Some(mime) => self.validator.validate_declared(data, mime),
            None => self.validator.validate(data),
        };
        let virus_scan = self.virus_scan(&hash, data).await;

        let mut blockers = Vec::new();
        if !validation.valid {
            blockers.push("Document failed structural validation");
        }
        if !virus_scan.safe {
            blockers.push("Document failed the reputation check");
        }
        if validation.has_javascript && self.block_active_content {
            blockers.push("Document contains active content");
        }
        if validation.has_embedded_files {
            if self.block_embedded_files {
                blockers.push("Document contains embedded files");
            } else {
                validation
                    .warnings
                    .push("Document contains embedded files".to_string());
            }
        }
        if validation.is_encrypted && !self.allow_encrypted {
            blockers.push("Encrypted documents are not accepted");
        }

        let safe = blockers.is_empty();
        let can_process = safe && !validation.is_encrypted;
        let message = match blockers.first() {
            Some(reason) => reason.to_string(),
            None if !can_process => "Document is encrypted and cannot be processed".to_string(),
            None => "Document passed all checks".to_string(),
        };

        tracing::info!(
            hash = %hash,
            safe,
            can_process,
            scanned = virus_scan.scanned,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Gate scan completed"
        );

        GateScan {
            hash,
            safe,
            can_process,
            message,
            validation,
            virus_scan,
        }
    }

    async fn virus_scan(&self, hash: &str, data: &[u8]) -> VirusScanSummary {
        if self.service.is_none() {
            return VirusScanSummary {
                scanned: false,
                safe: true,
                message: "Reputation scanning disabled".to_string(),
            };
        }

        match self.lookup(hash, data).await {
            Ok(ReputationVerdict::Safe) => VirusScanSummary {
                scanned: true,
                safe: true,
                message: "No threats found".to_string(),
            },
            Ok(ReputationVerdict::Unsafe { reason }) => {
                tracing::warn!(hash = %hash, reason = %reason, "Reputation provider flagged file");
                VirusScanSummary {
                    scanned: true,
                    safe: false,
                    message: "Threat detected".to_string(),
                }
            }
            Ok(ReputationVerdict::Unknown) => VirusScanSummary {
                scanned: true,
                safe: false,
                message: "No reputation verdict available".to_string(),
            },
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "Reputation lookup failed; failing closed");
                VirusScanSummary {
                    scanned: false,
                    safe: false,
                    message: "Reputation service unavailable".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(ReputationVerdict);

    #[async_trait]
    impl ReputationService for Fixed {
        async fn lookup(&self, _: &str, _: &[u8]) -> anyhow::Result<ReputationVerdict> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn config() -> ReputationConfig {
        ReputationConfig {
            provider: ReputationProvider::Disabled,
            timeout_secs: 1,
            block_active_content: true,
            block_embedded_files: false,
            allow_encrypted: false,
        }
    }

    fn png() -> Vec<u8> {
        let mut out = Vec::new();
        image::RgbImage::new(2, 2)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_disabled_gate_is_not_scanned() {
        let gate = ReputationGate::new(None, &config());
        let scan = gate.scan(&png(), "pixel.png").await;
        assert!(!scan.virus_scan.scanned);
        assert!(scan.virus_scan.safe);
        assert!(matches!(
            gate.lookup(&scan.hash, &png()).await,
            Err(AppError::ReputationUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_verdict_is_unsafe() {
        let gate = ReputationGate::new(Some(Arc::new(Fixed(ReputationVerdict::Unknown))), &config());
        let scan = gate.scan(&png(), "pixel.png").await;
        assert!(scan.virus_scan.scanned);
        assert!(!scan.safe);
        assert!(!scan.can_process);
    }

    #[tokio::test]
    async fn test_threat_name_is_not_exposed() {
        let gate = ReputationGate::new(
            Some(Arc::new(Fixed(ReputationVerdict::Unsafe {
                reason: "Eicar-Test-Signature".to_string(),
            }))),
            &config(),
        );
        let scan = gate.scan(&png(), "pixel.png").await;
        assert!(!scan.safe);
        assert!(!scan.message.contains("Eicar"));
        assert!(!scan.virus_scan.message.contains("Eicar"));
    }

    #[tokio::test]
    async fn test_declared_type_mismatch_is_unsafe() {
        let gate = ReputationGate::new(None, &config());
        assert!(gate.scan_declared(&png(), "pixel.png", "image/png").await.safe);

        let spoofed = gate.scan_declared(&png(), "pixel.pdf", "application/pdf").await;
        assert!(!spoofed.safe);
        assert!(!spoofed.validation.valid);
    }
}
