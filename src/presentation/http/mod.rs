//! HTTP Layer
//!
//! Routes and handlers for the HTTP surface.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
