//! Transport seam between the funnel core and a concrete messaging provider.

use async_trait::async_trait;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport error type.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Messaging provider adapter.
///
/// Implement this trait to plug the funnel into a concrete provider.
/// Dispatch treats every call as fallible and never retries; errors are
/// logged at the call site and the funnel moves on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the transport name (used in logs).
    fn name(&self) -> &'static str;

    /// Signal typing presence to the counterpart. Best-effort.
    async fn send_typing(&self, to: &str) -> TransportResult<()>;

    /// Deliver a text message.
    async fn send_text(&self, to: &str, body: &str) -> TransportResult<()>;

    /// Check provider reachability and credentials.
    async fn health_check(&self) -> TransportResult<()>;
}
