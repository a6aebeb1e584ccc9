//! Access gate: per-document policy evaluation, signed grants and the
//! append-only access log.

mod grant;
mod identity;
mod password;

pub use grant::{verify_grant, AccessGrant, GrantClaims, GrantSigner};
pub use identity::{DenyAllVerifier, FixedCodeVerifier, IdentityVerifier};
pub use password::{hash_access_password, verify_access_password};

use chrono::{DateTime, Utc};
use docshield_core::models::{AccessLogEntry, AccessOutcome, AccessType, ClientInfo};
use docshield_core::{AccessConfig, AppError};
use docshield_db::{AccessLogRepository, DocumentRepository};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Secondary verification presented with a request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessCredential {
    pub mfa_code: Option<String>,
    pub password: Option<String>,
}

impl AccessCredential {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn mfa(code: impl Into<String>) -> Self {
        Self {
            mfa_code: Some(code.into()),
            password: None,
        }
    }

    pub fn password(password: impl Into<String>) -> Self {
        Self {
            mfa_code: None,
            password: Some(password.into()),
        }
    }
}

/// Why an evaluation did not grant. The string goes to the log only.
enum Denial {
    Refused(String),
    BadCredential(String),
    Failed(AppError),
}

impl Denial {
    fn reason(&self) -> String {
        match self {
            Denial::Refused(reason) | Denial::BadCredential(reason) => reason.clone(),
            Denial::Failed(err) => err.to_string(),
        }
    }

    fn into_error(self) -> AppError {
        match self {
            Denial::Refused(_) => AppError::AccessDenied("Access denied".to_string()),
            Denial::BadCredential(_) => AppError::AccessDenied("Invalid credential".to_string()),
            Denial::Failed(err) => err,
        }
    }
}

#[derive(Clone)]
pub struct AccessGate {
    documents: Arc<dyn DocumentRepository>,
    log: Arc<dyn AccessLogRepository>,
    identity: Arc<dyn IdentityVerifier>,
    signer: GrantSigner,
}

impl AccessGate {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        log: Arc<dyn AccessLogRepository>,
        identity: Arc<dyn IdentityVerifier>,
        config: &AccessConfig,
    ) -> Self {
        Self {
            documents,
            log,
            identity,
            signer: GrantSigner::new(&config.grant_secret, config.grant_ttl_secs),
        }
    }

    /// Evaluate one access attempt.
    ///
    /// Every call appends exactly one log entry, and the append completes
    /// before this returns. If the append fails the call fails, whatever the
    /// decision was.
    #[tracing::instrument(skip(self, credential, client))]
    pub async fn evaluate(
        &self,
        document_id: Uuid,
        actor_id: Uuid,
        credential: &AccessCredential,
        access_type: AccessType,
        client: &ClientInfo,
    ) -> Result<AccessGrant, AppError> {
        let now = Utc::now();
        let mut entry = AccessLogEntry {
            id: Uuid::new_v4(),
            document_id,
            actor_id,
            access_type,
            outcome: AccessOutcome::Denied,
            secondary_verification_required: false,
            mfa_verified: false,
            password_verified: false,
            denial_reason: None,
            client: client.clone(),
            created_at: now,
        };

        let decision = match self
            .decide(document_id, actor_id, credential, &mut entry, now)
            .await
        {
            Ok(()) => self
                .signer
                .sign(document_id, actor_id, access_type, now)
                .map_err(Denial::Failed),
            Err(denial) => Err(denial),
        };

        match decision {
            Ok((token, expires_at)) => {
                entry.outcome = AccessOutcome::Granted;
                self.log.append(&entry).await?;
                tracing::info!(
                    document_id = %document_id,
                    access_type = %access_type,
                    secondary_verification = entry.secondary_verification_required,
                    "Access granted"
                );

                if let Err(e) = self.documents.record_access(document_id, now).await {
                    tracing::warn!(document_id = %document_id, error = %e, "Failed to record access counters");
                }

                Ok(AccessGrant {
                    token,
                    document_id,
                    actor_id,
                    access_type,
                    expires_at,
                    log_entry_id: entry.id,
                })
            }
            Err(denial) => {
                entry.denial_reason = Some(denial.reason());
                self.log.append(&entry).await?;
                tracing::warn!(
                    document_id = %document_id,
                    access_type = %access_type,
                    reason = ?entry.denial_reason,
                    "Access denied"
                );
                Err(denial.into_error())
            }
        }
    }

    /// Check a grant issued by this gate.
    pub fn verify_grant(&self, token: &str, document_id: Uuid) -> Result<GrantClaims, AppError> {
        self.signer.verify(token, document_id)
    }

    pub async fn access_log(&self, document_id: Uuid) -> Result<Vec<AccessLogEntry>, AppError> {
        self.log.list_for_document(document_id).await
    }

    async fn decide(
        &self,
        document_id: Uuid,
        actor_id: Uuid,
        credential: &AccessCredential,
        entry: &mut AccessLogEntry,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        let document = match self.documents.get(document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => return Err(Denial::Refused("document not found".to_string())),
            Err(e) => return Err(Denial::Failed(e)),
        };
        entry.secondary_verification_required = document.policy.requires_secondary_verification();

        if document.owner_id != actor_id {
            return Err(Denial::Refused("actor is not the owner".to_string()));
        }
        document
            .ensure_servable(now)
            .map_err(|e| Denial::Refused(e.to_string()))?;

        if document.policy.requires_mfa {
            let code = credential
                .mfa_code
                .as_deref()
                .ok_or_else(|| Denial::BadCredential("mfa code missing".to_string()))?;
            match self.identity.verify_mfa_code(actor_id, code).await {
                Ok(true) => entry.mfa_verified = true,
                Ok(false) => return Err(Denial::BadCredential("mfa code rejected".to_string())),
                Err(e) => {
                    return Err(Denial::BadCredential(format!(
                        "identity verifier unavailable: {:#}",
                        e
                    )))
                }
            }
        }

        if let Some(hash) = &document.policy.access_password_hash {
            let password = credential
                .password
                .as_deref()
                .ok_or_else(|| Denial::BadCredential("password missing".to_string()))?;
            match verify_access_password(password, hash) {
                Ok(true) => entry.password_verified = true,
                Ok(false) => return Err(Denial::BadCredential("password rejected".to_string())),
                Err(e) => return Err(Denial::BadCredential(e.to_string())),
            }
        }

        Ok(())
    }
}
