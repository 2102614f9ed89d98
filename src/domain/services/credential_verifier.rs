//! Credential verification contract.
//!
//! Credential issuance (login, signup, password hashing) lives outside the
//! gateway. The gateway only needs to turn a presented token into a user
//! identity.

use chrono::{DateTime, Utc};

use crate::domain::entities::UserId;

/// Reasons a credential is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Malformed token")]
    Malformed,
}

/// Identity extracted from a valid credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub user_id: UserId,
    /// End of the credential's validity window
    pub expires_at: DateTime<Utc>,
    /// Role used for role-targeted broadcasts
    pub role: Option<String>,
}

/// Turns an opaque token into a user identity.
///
/// Implementations must be pure and fast: no I/O, no side effects. The call
/// is made inline on the connection's task during the handshake.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<VerifiedCredential, AuthError>;
}
