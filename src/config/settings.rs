//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// JWT verification settings
    pub jwt: JwtSettings,

    /// WebSocket session and delivery policy
    pub websocket: WebSocketSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// JWT verification configuration.
///
/// Tokens are issued elsewhere; the gateway only needs the shared secret.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key tokens are signed with
    pub secret: String,

    /// Clock skew tolerated when checking `exp`, in seconds
    pub leeway_secs: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket session and delivery policy.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Outbound payload queue capacity per channel
    pub outbound_queue_capacity: usize,

    /// Queue capacity for control frames (pong, close) per channel
    pub control_queue_capacity: usize,

    /// Time allowed for a client to present a credential
    pub handshake_timeout_secs: u64,

    /// Close a channel after this long without client activity
    pub idle_timeout_secs: u64,

    /// Close a channel after this many consecutive dropped payloads (0 = never)
    pub max_consecutive_drops: u32,

    /// Force-close a channel when its credential expires
    pub close_on_credential_expiry: bool,

    /// Time allowed on shutdown for all channels to deregister
    pub shutdown_grace_secs: u64,

    /// Time allowed for a channel's final close frame to be written
    pub close_frame_timeout_ms: u64,

    /// Maximum inbound message size in bytes
    pub max_message_size: usize,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("jwt.leeway_secs", 0)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.outbound_queue_capacity", 256_i64)?
            .set_default("websocket.control_queue_capacity", 16_i64)?
            .set_default("websocket.handshake_timeout_secs", 10_i64)?
            .set_default("websocket.idle_timeout_secs", 120_i64)?
            .set_default("websocket.max_consecutive_drops", 64_i64)?
            .set_default("websocket.close_on_credential_expiry", false)?
            .set_default("websocket.shutdown_grace_secs", 10_i64)?
            .set_default("websocket.close_frame_timeout_ms", 1000_i64)?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=8000 -> server.port = 8000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Check values that deserialize fine but make no sense at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        self.websocket.validate()
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebSocketSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_queue_capacity == 0 || self.control_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "websocket queue capacities must be at least 1".into(),
            ));
        }
        if self.handshake_timeout_secs == 0
            || self.idle_timeout_secs == 0
            || self.close_frame_timeout_ms == 0
        {
            return Err(ConfigError::Message(
                "websocket timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn close_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.close_frame_timeout_ms)
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            control_queue_capacity: 16,
            handshake_timeout_secs: 10,
            idle_timeout_secs: 120,
            max_consecutive_drops: 64,
            close_on_credential_expiry: false,
            shutdown_grace_secs: 10,
            close_frame_timeout_ms: 1000,
            max_message_size: 65536,
        }
    }
}
