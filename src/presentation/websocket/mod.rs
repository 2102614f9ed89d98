//! WebSocket Gateway
//!
//! Per-user alert channels over WebSocket connections.

pub mod handler;
pub mod messages;
pub mod session;

pub use handler::{ws_handler, ConnectParams};
pub use messages::{ClientFrame, ServerFrame};
pub use session::{authenticate, SessionConfig, SessionSupervisor};
