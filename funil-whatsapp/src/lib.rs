//! Funil WhatsApp - WhatsApp Cloud API surface for the Funil responder.
//!
//! Wires the funnel core to the Business Cloud API:
//!
//! ```text
//! Meta webhook → routes → InboundRouter → Dispatcher → CloudApiClient
//!                                              ↓
//!                                      SessionRegistry (idle timers)
//! ```
//!
//! A keep-alive supervisor probes the Graph API in the background, and the
//! root path serves the plain-text liveness body uptime monitors expect.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod cloud;
pub mod routes;
pub mod supervisor;

// Re-export commonly used types
pub use cloud::CloudApiClient;
pub use routes::{build_router, create_state, AppState};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use funil_common::Config;
use funil_core::{Dispatcher, IdleCloser, InboundRouter, SessionRegistry};

/// Upper bound for webhook bodies.
const MAX_BODY_BYTES: usize = 1024 * 1024;
/// Per-request timeout for the HTTP surface.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Start the WhatsApp HTTP server with the full funnel pipeline.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let whatsapp = Arc::new(CloudApiClient::new(
        config.whatsapp.access_token.clone(),
        config.whatsapp.phone_number_id.clone(),
        config.whatsapp.verify_token.clone(),
    ));

    // Funnel pipeline: registry → dispatcher → per-sender router
    let notifier = Arc::new(IdleCloser::new(whatsapp.clone()));
    let registry = SessionRegistry::new(notifier);
    let dispatcher = Arc::new(Dispatcher::new(registry, whatsapp.clone()));

    let (state, rx) = create_state(whatsapp.clone(), config.whatsapp.app_secret.clone());
    let router_handle = InboundRouter::spawn(dispatcher, rx);

    // Startup probe doubles as credential verification
    let supervisor_handle = supervisor::spawn(whatsapp);

    let router = build_router(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    tracing::info!("Starting Funil WhatsApp on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Clean up on shutdown
    supervisor_handle.abort();
    router_handle.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
