//! # Domain Layer
//!
//! Core types of the alert gateway, independent of the transport.
//!
//! ## Structure
//!
//! - **entities**: user identities, channels and alert payloads
//! - **services**: contracts consumed from external collaborators
//!   (credential verification)

pub mod entities;
pub mod services;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
