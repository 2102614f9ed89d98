//! Application Startup
//!
//! Application building, server initialization and graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::application::services::Dispatcher;
use crate::config::Settings;
use crate::domain::{CloseReason, CredentialVerifier};
use crate::infrastructure::auth::JwtCredentialVerifier;
use crate::infrastructure::registry::ConnectionRegistry;
use crate::presentation::http::{create_router, handlers::health};
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{SessionConfig, SessionSupervisor};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionSupervisor>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the registry, dispatcher and session supervisor around a verifier.
    pub fn new(settings: Settings, verifier: Arc<dyn CredentialVerifier>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            settings.websocket.max_consecutive_drops,
        ));
        let sessions = Arc::new(SessionSupervisor::new(
            Arc::clone(&registry),
            Arc::clone(&verifier),
            SessionConfig::from(&settings.websocket),
        ));

        Self {
            registry,
            dispatcher,
            sessions,
            verifier,
            settings: Arc::new(settings),
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let verifier = Arc::new(JwtCredentialVerifier::new(&settings.jwt));
        Self::build_with_verifier(settings, verifier).await
    }

    /// Build the application around an arbitrary credential verifier
    pub async fn build_with_verifier(
        settings: Settings,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self> {
        health::init_server_start();

        let state = AppState::new(settings, verifier);

        // Build router with middleware
        let router = create_router(state.clone())
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&state.settings.cors));

        // Bind to address
        let listener = TcpListener::bind(state.settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            state,
        })
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared state, for alert sources embedded in the same process
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until Ctrl-C or SIGTERM
    pub async fn run_until_stopped(self) -> Result<()> {
        self.run_with_shutdown(shutdown_signal()).await
    }

    /// Run the server until `signal` resolves, then close and drain every
    /// channel.
    pub async fn run_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            router,
            state,
        } = self;

        let registry = Arc::clone(&state.registry);
        let shutdown = async move {
            signal.await;
            let closed = registry.close_all(CloseReason::ServerShutdown);
            tracing::info!(channels = closed, "Shutdown requested, closing channels");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        let grace = state.settings.websocket.shutdown_grace();
        if state.registry.drain(grace).await {
            tracing::info!("All channels drained");
        } else {
            tracing::warn!(
                remaining = state.registry.total_channels(),
                "Shutdown grace period elapsed with channels still open"
            );
        }

        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
