//! Application Layer
//!
//! Orchestrates delivery between alert producers and the connection
//! registry.

pub mod services;
pub mod dto;
