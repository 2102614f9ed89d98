//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use alert_gateway::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Idle timeout: {:?}", settings.websocket.idle_timeout());
//! ```

mod settings;

pub use settings::*;
