//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod alerts;
pub mod health;
