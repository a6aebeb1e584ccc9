use async_trait::async_trait;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Second-factor check, backed by whatever identity provider the deployment
/// uses.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(false)` for a wrong code; `Err` when the provider cannot answer.
    async fn verify_mfa_code(&self, user_id: Uuid, code: &str) -> anyhow::Result<bool>;
}

/// Accepts one configured code for every user. For offline tooling and tests.
pub struct FixedCodeVerifier {
    code: String,
}

impl FixedCodeVerifier {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl IdentityVerifier for FixedCodeVerifier {
    async fn verify_mfa_code(&self, _user_id: Uuid, code: &str) -> anyhow::Result<bool> {
        Ok(bool::from(self.code.as_bytes().ct_eq(code.as_bytes())))
    }
}

/// Rejects every code. Used when no identity provider is configured.
pub struct DenyAllVerifier;

#[async_trait]
impl IdentityVerifier for DenyAllVerifier {
    async fn verify_mfa_code(&self, _user_id: Uuid, _code: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_code() {
        let verifier = FixedCodeVerifier::new("123456");
        let user = Uuid::new_v4();
        assert!(verifier.verify_mfa_code(user, "123456").await.unwrap());
        assert!(!verifier.verify_mfa_code(user, "123457").await.unwrap());
        assert!(!verifier.verify_mfa_code(user, "").await.unwrap());
        assert!(!DenyAllVerifier.verify_mfa_code(user, "123456").await.unwrap());
    }
}
