//! Short-lived signed access grants (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use docshield_core::models::AccessType;
use docshield_core::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantClaims {
    /// Actor the grant was issued to
    pub sub: String,
    /// Document the grant covers
    pub doc: String,
    /// Access type, e.g. `download`
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Issued by the access gate after a granted evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub token: String,
    pub document_id: Uuid,
    pub actor_id: Uuid,
    pub access_type: AccessType,
    pub expires_at: DateTime<Utc>,
    /// Access log entry recording this grant
    pub log_entry_id: Uuid,
}

#[derive(Clone)]
pub struct GrantSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl GrantSigner {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn sign(
        &self,
        document_id: Uuid,
        actor_id: Uuid,
        access_type: AccessType,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let expires_at = now + self.ttl;
        let claims = GrantClaims {
            sub: actor_id.to_string(),
            doc: document_id.to_string(),
            scope: access_type.as_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign access grant: {}", e)))?;
        Ok((token, expires_at))
    }

    /// Check signature and expiry, and that the grant covers `document_id`.
    pub fn verify(&self, token: &str, document_id: Uuid) -> Result<GrantClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<GrantClaims>(token, &self.decoding, &validation)
            .map_err(|e| AppError::AccessDenied(format!("invalid grant: {}", e)))?
            .claims;
        if claims.doc != document_id.to_string() {
            return Err(AppError::AccessDenied(format!(
                "grant does not cover document {}",
                document_id
            )));
        }
        Ok(claims)
    }
}

/// Verify a grant with a raw secret.
pub fn verify_grant(secret: &str, token: &str, document_id: Uuid) -> Result<GrantClaims, AppError> {
    GrantSigner::new(secret, 0).verify(token, document_id)
}
