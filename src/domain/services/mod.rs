//! Domain Services
//!
//! Contracts the gateway consumes from its collaborators.

mod credential_verifier;

pub use credential_verifier::{AuthError, CredentialVerifier, VerifiedCredential};

#[cfg(test)]
pub use credential_verifier::MockCredentialVerifier;
