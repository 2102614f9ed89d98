//! Application Services
//!
//! ## Available Services
//!
//! - **Dispatcher**: fans alert payloads out to users' live channels

pub mod dispatcher;

pub use dispatcher::{ChannelDelivery, DeliveryOutcome, DeliveryResult, Dispatcher, RoleFilter};
