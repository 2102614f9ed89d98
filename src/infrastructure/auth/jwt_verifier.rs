//! JWT credential verifier.
//!
//! Verifies HS256 access tokens issued by the login service. The user is
//! taken from `sub`, or from a numeric or string `user_id` claim for tokens
//! minted by older issuers.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::JwtSettings;
use crate::domain::{AuthError, CredentialVerifier, UserId, VerifiedCredential};

/// JWT claims accepted by the gateway
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Legacy user ID claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Claims {
    fn subject(&self) -> Option<UserId> {
        if let Some(sub) = self.sub.as_deref().filter(|s| !s.is_empty()) {
            return Some(UserId::new(sub));
        }
        match &self.user_id {
            Some(Value::Number(n)) => Some(UserId::from(n.to_string())),
            Some(Value::String(s)) if !s.is_empty() => Some(UserId::new(s)),
            _ => None,
        }
    }
}

/// HS256 JWT verifier
pub struct JwtCredentialVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtCredentialVerifier {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = settings.leeway_secs;

        Self {
            key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
        }
    }
}

impl CredentialVerifier for JwtCredentialVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedCredential, AuthError> {
        let token_data =
            decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::MissingRequiredClaim(_) => AuthError::Malformed,
                _ => AuthError::InvalidToken,
            })?;

        let claims = token_data.claims;
        let user_id = claims.subject().ok_or(AuthError::Malformed)?;
        let expires_at: DateTime<Utc> =
            DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::Malformed)?;

        Ok(VerifiedCredential {
            user_id,
            expires_at,
            role: claims.role.map(|r| r.to_lowercase()),
        })
    }
}
