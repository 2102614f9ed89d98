//! In-memory connection registry.

mod connection_registry;

pub use connection_registry::{ConnectionRegistry, RegistryStats};
