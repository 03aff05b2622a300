//! Keep-alive supervisor for the transport connection.
//!
//! Probes the provider at startup (credential verification) and on a fixed
//! interval afterwards. While the provider is unreachable the loop tightens
//! to a short retry delay until the first successful probe.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use funil_core::Transport;

/// Probe interval while the provider is healthy.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(300);
/// Retry delay while the provider is unreachable.
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Spawn the keep-alive loop. Runs for the process lifetime; probe failures
/// never take the HTTP surface down.
pub fn spawn(transport: Arc<dyn Transport>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(transport = transport.name(), "Keep-alive supervisor started");

        let mut healthy = match transport.health_check().await {
            Ok(()) => {
                tracing::info!(transport = transport.name(), "Transport credentials verified");
                true
            }
            Err(e) => {
                tracing::warn!(
                    transport = transport.name(),
                    error = %e,
                    "Transport verification failed, retrying"
                );
                false
            }
        };

        loop {
            let delay = if healthy { KEEPALIVE_INTERVAL } else { RETRY_DELAY };
            tokio::time::sleep(delay).await;

            match transport.health_check().await {
                Ok(()) => {
                    if !healthy {
                        tracing::info!(transport = transport.name(), "Transport recovered");
                    }
                    healthy = true;
                }
                Err(e) => {
                    if healthy {
                        tracing::warn!(
                            transport = transport.name(),
                            error = %e,
                            "Keep-alive probe failed, tightening retries"
                        );
                    }
                    healthy = false;
                }
            }
        }
    })
}
