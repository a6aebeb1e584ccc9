use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::scan::DocumentScanResult;
use crate::error::AppError;

/// Safety state of an uploaded document.
///
/// States only move forward: `pending_scan -> safe | unsafe`, and
/// `unsafe -> quarantined` through an administrative action. Leaving
/// `unsafe` or `quarantined` is not possible from inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyState {
    PendingScan,
    Safe,
    Unsafe,
    Quarantined,
}

impl SafetyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyState::PendingScan => "pending_scan",
            SafetyState::Safe => "safe",
            SafetyState::Unsafe => "unsafe",
            SafetyState::Quarantined => "quarantined",
        }
    }

    pub fn can_transition_to(self, next: SafetyState) -> bool {
        matches!(
            (self, next),
            (SafetyState::PendingScan, SafetyState::Safe)
                | (SafetyState::PendingScan, SafetyState::Unsafe)
                | (SafetyState::Unsafe, SafetyState::Quarantined)
        )
    }

    pub fn transition_to(self, next: SafetyState) -> Result<SafetyState, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Only `safe` documents may have their bytes served.
    pub fn is_servable(self) -> bool {
        self == SafetyState::Safe
    }

    pub fn is_terminal(self) -> bool {
        self == SafetyState::Quarantined
    }
}

impl Display for SafetyState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SafetyState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_scan" => Ok(SafetyState::PendingScan),
            "safe" => Ok(SafetyState::Safe),
            "unsafe" => Ok(SafetyState::Unsafe),
            "quarantined" => Ok(SafetyState::Quarantined),
            other => Err(AppError::InvalidInput(format!(
                "Unknown safety state: {}",
                other
            ))),
        }
    }
}

/// Per-document access policy evaluated by the access gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub requires_mfa: bool,
    /// Argon2 PHC string; never the plain password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_password_hash: Option<String>,
    pub is_encrypted: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessPolicy {
    pub fn requires_secondary_verification(&self) -> bool {
        self.requires_mfa || self.access_password_hash.is_some()
    }
}

/// An uploaded file tracked by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureDocument {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_filename: String,
    pub file_size: i64,
    pub content_type: String,
    /// SHA-256 of the stored bytes, lowercase hex
    pub content_hash: String,
    pub storage_key: String,
    pub safety_state: SafetyState,
    pub scan_result: Option<DocumentScanResult>,
    pub policy: AccessPolicy,
    pub page_count: Option<u32>,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecureDocument {
    /// Expiry is evaluated at read time, never stored as a state.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.policy
            .expires_at
            .map(|expires_at| expires_at <= now)
            .unwrap_or(false)
    }

    /// Record the outcome of validation + reputation scanning.
    ///
    /// `safe` is reached only when both the structural validator and the
    /// reputation gate said yes; every other combination lands in `unsafe`.
    pub fn apply_scan_result(&mut self, result: DocumentScanResult) -> Result<(), AppError> {
        let next = if result.validation.valid && result.gate_safe {
            SafetyState::Safe
        } else {
            SafetyState::Unsafe
        };
        self.safety_state = self.safety_state.transition_to(next)?;
        self.policy.is_encrypted = result.validation.is_encrypted;
        if self.page_count.is_none() {
            self.page_count = result.validation.page_count;
        }
        self.scan_result = Some(result);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn quarantine(&mut self) -> Result<(), AppError> {
        self.safety_state = self.safety_state.transition_to(SafetyState::Quarantined)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fails closed unless the document is `safe` and not expired.
    pub fn ensure_servable(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.safety_state.is_servable() {
            return Err(AppError::AccessDenied(format!(
                "document {} is {}",
                self.id, self.safety_state
            )));
        }
        if self.is_expired(now) {
            return Err(AppError::AccessDenied(format!(
                "document {} expired",
                self.id
            )));
        }
        Ok(())
    }

    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed_at = Some(now);
    }
}

/// Metadata accompanying an upload; the bytes travel separately.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UploadRequest {
    pub owner_id: Uuid,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub filename: String,
    #[validate(length(min = 1, max = 127, message = "Content type is required"))]
    pub content_type: String,
    #[serde(default)]
    pub requires_mfa: bool,
    #[serde(default, skip_serializing)]
    #[validate(length(
        min = 8,
        max = 256,
        message = "Access password must be between 8 and 256 characters"
    ))]
    pub access_password: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scan::{ValidationReport, VirusScanSummary};
    use crate::models::DocumentFormat;

    fn pending_document() -> SecureDocument {
        let now = Utc::now();
        SecureDocument {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            original_filename: "report.pdf".to_string(),
            file_size: 1024,
            content_type: "application/pdf".to_string(),
            content_hash: "ab".repeat(32),
            storage_key: "documents/report.pdf".to_string(),
            safety_state: SafetyState::PendingScan,
            scan_result: None,
            policy: AccessPolicy::default(),
            page_count: None,
            access_count: 0,
            last_accessed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn scan_result(valid: bool, gate_safe: bool) -> DocumentScanResult {
        DocumentScanResult {
            validation: ValidationReport {
                valid,
                page_count: Some(2),
                ..ValidationReport::empty(DocumentFormat::Pdf)
            },
            virus_scan: VirusScanSummary {
                scanned: true,
                safe: gate_safe,
                message: "ok".to_string(),
            },
            gate_safe,
        }
    }

    #[test]
    fn test_transitions_only_move_forward() {
        assert!(SafetyState::PendingScan.can_transition_to(SafetyState::Safe));
        assert!(SafetyState::PendingScan.can_transition_to(SafetyState::Unsafe));
        assert!(SafetyState::Unsafe.can_transition_to(SafetyState::Quarantined));
        assert!(!SafetyState::Unsafe.can_transition_to(SafetyState::Safe));
        assert!(!SafetyState::Safe.can_transition_to(SafetyState::PendingScan));
        assert!(!SafetyState::Quarantined.can_transition_to(SafetyState::Unsafe));
        assert!(!SafetyState::Safe.can_transition_to(SafetyState::Quarantined));
    }

    #[test]
    fn test_scan_result_requires_both_checks() {
        let mut doc = pending_document();
        doc.apply_scan_result(scan_result(true, false)).unwrap();
        assert_eq!(doc.safety_state, SafetyState::Unsafe);

        let mut doc = pending_document();
        doc.apply_scan_result(scan_result(false, true)).unwrap();
        assert_eq!(doc.safety_state, SafetyState::Unsafe);

        let mut doc = pending_document();
        doc.apply_scan_result(scan_result(true, true)).unwrap();
        assert_eq!(doc.safety_state, SafetyState::Safe);
        assert_eq!(doc.page_count, Some(2));
    }

    #[test]
    fn test_unsafe_document_never_becomes_safe() {
        let mut doc = pending_document();
        doc.apply_scan_result(scan_result(false, false)).unwrap();
        let err = doc.apply_scan_result(scan_result(true, true)).unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
        assert_eq!(doc.safety_state, SafetyState::Unsafe);

        doc.quarantine().unwrap();
        assert!(doc.safety_state.is_terminal());
        assert!(doc.quarantine().is_err());
    }

    #[test]
    fn test_servable_only_when_safe_and_not_expired() {
        let now = Utc::now();
        let mut doc = pending_document();
        assert!(doc.ensure_servable(now).is_err());

        doc.apply_scan_result(scan_result(true, true)).unwrap();
        assert!(doc.ensure_servable(now).is_ok());

        doc.policy.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(doc.is_expired(now));
        assert!(doc.ensure_servable(now).is_err());
    }

    #[test]
    fn test_safety_state_round_trips_through_str() {
        for state in [
            SafetyState::PendingScan,
            SafetyState::Safe,
            SafetyState::Unsafe,
            SafetyState::Quarantined,
        ] {
            assert_eq!(state.as_str().parse::<SafetyState>().unwrap(), state);
        }
        assert!("deleted".parse::<SafetyState>().is_err());
    }

    #[test]
    fn test_upload_request_rejects_short_password() {
        let mut request = UploadRequest {
            owner_id: Uuid::new_v4(),
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            requires_mfa: false,
            access_password: None,
            expires_at: None,
        };
        assert!(request.validate().is_ok());

        request.access_password = Some("short".to_string());
        assert!(request.validate().is_err());

        request.access_password = Some("long enough".to_string());
        request.filename = String::new();
        assert!(request.validate().is_err());
    }
}
