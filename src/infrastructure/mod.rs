//! Infrastructure Layer
//!
//! Implementations behind the domain types:
//! - Connection registry (in-process)
//! - JWT credential verification
//! - Prometheus metrics

pub mod auth;
pub mod metrics;
pub mod registry;
