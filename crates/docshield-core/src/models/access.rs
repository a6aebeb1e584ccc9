use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Operation a caller attempts on a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    View,
    Download,
    PreviewRedaction,
    ApplyRedaction,
    Share,
    Delete,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::View => "view",
            AccessType::Download => "download",
            AccessType::PreviewRedaction => "preview_redaction",
            AccessType::ApplyRedaction => "apply_redaction",
            AccessType::Share => "share",
            AccessType::Delete => "delete",
        }
    }
}

impl Display for AccessType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(AccessType::View),
            "download" => Ok(AccessType::Download),
            "preview_redaction" => Ok(AccessType::PreviewRedaction),
            "apply_redaction" => Ok(AccessType::ApplyRedaction),
            "share" => Ok(AccessType::Share),
            "delete" => Ok(AccessType::Delete),
            other => Err(AppError::InvalidInput(format!(
                "Unknown access type: {}",
                other
            ))),
        }
    }
}

/// Network/agent metadata supplied by the surrounding application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessOutcome {
    Granted,
    Denied,
}

impl AccessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessOutcome::Granted => "granted",
            AccessOutcome::Denied => "denied",
        }
    }
}

impl FromStr for AccessOutcome {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "granted" => Ok(AccessOutcome::Granted),
            "denied" => Ok(AccessOutcome::Denied),
            other => Err(AppError::InvalidInput(format!(
                "Unknown access outcome: {}",
                other
            ))),
        }
    }
}

/// One access-gate evaluation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: Uuid,
    pub document_id: Uuid,
    pub actor_id: Uuid,
    pub access_type: AccessType,
    pub outcome: AccessOutcome,
    /// Whether the document's policy demanded MFA or a password
    pub secondary_verification_required: bool,
    pub mfa_verified: bool,
    pub password_verified: bool,
    /// Operator-facing reason for a denial; never returned to callers
    pub denial_reason: Option<String>,
    pub client: ClientInfo,
    pub created_at: DateTime<Utc>,
}

impl AccessLogEntry {
    pub fn is_granted(&self) -> bool {
        self.outcome == AccessOutcome::Granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_type_round_trip() {
        for t in [
            AccessType::View,
            AccessType::Download,
            AccessType::PreviewRedaction,
            AccessType::ApplyRedaction,
            AccessType::Share,
            AccessType::Delete,
        ] {
            assert_eq!(t.as_str().parse::<AccessType>().unwrap(), t);
        }
        assert!("print".parse::<AccessType>().is_err());
    }

    #[test]
    fn test_access_type_serde_matches_as_str() {
        let json = serde_json::to_string(&AccessType::PreviewRedaction).unwrap();
        assert_eq!(json, "\"preview_redaction\"");
    }
}
