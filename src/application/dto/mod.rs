//! Data Transfer Objects
//!
//! DTOs for API request serialization. Responses reuse the dispatcher's
//! `DeliveryResult` directly.

pub mod request;

pub use request::BroadcastRequest;
