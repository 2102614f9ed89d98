//! Credential verification backed by JWT access tokens.

mod jwt_verifier;

pub use jwt_verifier::{Claims, JwtCredentialVerifier};
