//! Identity Gate: turns a raw credential token into a validated [`Identity`].
//!
//! Runs before a connection is admitted. A failure here has no side effects:
//! no session is registered and nothing is broadcast.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::models::user::Identity;

/// Claims carried by a credential token issued by the account service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Verifies a credential token. Issuance lives outside this service.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, ChatError>;
}

/// HS256 JWT verifier sharing a secret with the account service.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = 5;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, ChatError> {
        let data = jsonwebtoken::decode::<CredentialClaims>(token, &self.key, &self.validation)
            .map_err(|err| {
                tracing::debug!(?err, "credential rejected");
                ChatError::Unauthorized("Invalid or expired token".to_string())
            })?;

        let claims = data.claims;
        if claims.user_id.trim().is_empty() || claims.username.trim().is_empty() {
            return Err(ChatError::Unauthorized("Malformed token".to_string()));
        }

        Ok(Identity::new(claims.user_id, claims.username))
    }
}

/// Front door for both the live transport and REST extractors.
#[derive(Clone)]
pub struct IdentityGate {
    verifier: Arc<dyn CredentialVerifier>,
}

impl IdentityGate {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    /// Validate a token pulled from a handshake or header. Accepts an
    /// optional `Bearer ` prefix.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, ChatError> {
        let token = token
            .map(str::trim)
            .map(|t| t.strip_prefix("Bearer ").unwrap_or(t).trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChatError::Unauthorized("No token provided".to_string()))?;

        self.verifier.verify(token).await
    }
}
