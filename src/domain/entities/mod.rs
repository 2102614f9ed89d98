//! # Domain Entities
//!
//! - **UserId**: registry key for a user
//! - **Channel**: one live connection, its lifecycle state and outbound queue
//! - **Payload**: an immutable alert message

mod channel;
mod payload;
mod user;

pub use channel::{ChannelHandle, ChannelId, ChannelState, CloseReason};
pub use payload::{AlertEvent, Payload};
pub use user::UserId;
