//! HTTP routes for the Funil WhatsApp service.
//!
//! Provides the uptime-monitor liveness endpoint and the Meta Cloud API
//! webhook pair (GET verification handshake, POST message delivery).

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use funil_core::InboundMessage;

use crate::cloud::CloudApiClient;

/// Exact body uptime monitors probe for.
pub const LIVENESS_BODY: &str = "Bot WhatsApp ativo ✅";

// ============================================================================
// State
// ============================================================================

/// Shared state for the HTTP server.
pub struct AppState {
    /// WhatsApp Cloud API client
    pub whatsapp: Arc<CloudApiClient>,
    /// App secret for webhook signature verification (optional)
    pub app_secret: Option<Arc<str>>,
    /// Channel for forwarding incoming messages
    pub message_tx: mpsc::Sender<InboundMessage>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    status: &'static str,
}

// ============================================================================
// Health Routes
// ============================================================================

async fn liveness() -> &'static str {
    LIVENESS_BODY
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "funil-whatsapp",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Check if the inbound pipeline is still accepting messages
    if state.message_tx.is_closed() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready",
                service: "funil-whatsapp",
                version: env!("CARGO_PKG_VERSION"),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ready",
            service: "funil-whatsapp",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

// ============================================================================
// WhatsApp Webhook
// ============================================================================

/// WhatsApp verification query params (Meta webhook verification)
#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Verify a webhook signature (X-Hub-Signature-256).
/// Returns true if the signature is valid, false otherwise.
/// See: <https://developers.facebook.com/docs/graph-api/webhooks/getting-started#verification-requests>
fn verify_signature(app_secret: &str, body: &[u8], signature_header: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // Signature format: "sha256=<hex_signature>"
    let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

/// Compare a presented secret against the expected one, touching every
/// byte pair regardless of where the first mismatch sits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// GET /webhook/whatsapp - Meta webhook verification
async fn webhook_verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyQuery>,
) -> impl IntoResponse {
    let token_matches = params
        .verify_token
        .as_deref()
        .is_some_and(|t| constant_time_eq(t.as_bytes(), state.whatsapp.verify_token().as_bytes()));

    if params.mode.as_deref() == Some("subscribe") && token_matches {
        if let Some(challenge) = params.challenge {
            tracing::info!("WhatsApp webhook verified successfully");
            return (StatusCode::OK, challenge);
        }
        return (StatusCode::BAD_REQUEST, "Missing hub.challenge".to_string());
    }

    tracing::warn!("WhatsApp webhook verification failed, token mismatch");
    (StatusCode::FORBIDDEN, "Forbidden".to_string())
}

/// POST /webhook/whatsapp - incoming message webhook
async fn webhook_receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // Verify X-Hub-Signature-256 when an app secret is configured
    if let Some(ref app_secret) = state.app_secret {
        let signature = headers
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !verify_signature(app_secret, &body, signature) {
            tracing::warn!(
                "Webhook signature verification failed (signature: {})",
                if signature.is_empty() { "missing" } else { "invalid" }
            );
            return (
                StatusCode::UNAUTHORIZED,
                Json(WebhookAck {
                    status: "invalid_signature",
                }),
            );
        }
    }

    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(WebhookAck {
                status: "invalid_payload",
            }),
        );
    };

    // Status-only notifications parse to an empty batch and are acknowledged
    let messages = match state.whatsapp.parse_webhook(&payload) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!("Discarding webhook payload: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookAck {
                    status: "invalid_payload",
                }),
            );
        }
    };

    for msg in messages {
        tracing::info!(
            sender = %msg.sender,
            preview = %msg.body.chars().take(50).collect::<String>(),
            "WhatsApp message received"
        );

        if let Err(e) = state.message_tx.send(msg).await {
            tracing::error!("Failed to forward WhatsApp message: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAck { status: "error" }),
            );
        }
    }

    (StatusCode::OK, Json(WebhookAck { status: "received" }))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Liveness probe (plain text, exact body)
        .route("/", get(liveness))
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Meta webhook
        .route(
            "/webhook/whatsapp",
            get(webhook_verify).post(webhook_receive),
        )
        // Add state
        .with_state(state)
}

/// Create the shared state with an inbound message receiver.
pub fn create_state(
    whatsapp: Arc<CloudApiClient>,
    app_secret: Option<String>,
) -> (Arc<AppState>, mpsc::Receiver<InboundMessage>) {
    let (tx, rx) = mpsc::channel(100);

    let state = Arc::new(AppState {
        whatsapp,
        app_secret: app_secret.map(Arc::from),
        message_tx: tx,
    });

    (state, rx)
}
