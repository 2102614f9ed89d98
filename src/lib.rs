//! # Alert Gateway Library
//!
//! Real-time alert delivery over per-user WebSocket channels:
//! - Connection registry mapping users to their live channels
//! - Dispatcher fanning alert payloads out with per-channel backpressure
//! - Session supervisor driving each connection from handshake to teardown
//! - HTTP surface for alert sources, health and metrics
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Channels, payloads and the credential verifier trait
//! - **Application Layer**: Delivery fan-out and request DTOs
//! - **Infrastructure Layer**: Registry, JWT verification and metrics
//! - **Presentation Layer**: HTTP handlers and the WebSocket session
//!
//! ## Module Structure
//!
//! ```text
//! alert_gateway/
//! +-- config/         Configuration management
//! +-- domain/         Entities and service traits
//! +-- application/    Dispatcher and DTOs
//! +-- infrastructure/ Registry, auth and metrics
//! +-- presentation/   HTTP routes and WebSocket sessions
//! +-- shared/         Error types
//! ```

// Configuration module
pub mod config;

// Domain layer - Core types
pub mod domain;

// Application layer - Delivery services
pub mod application;

// Infrastructure layer - Registry and external integrations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
