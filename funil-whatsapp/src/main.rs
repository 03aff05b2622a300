//! Funil WhatsApp - Main entry point.

use anyhow::Result;
use funil_common::{init_logging, Config};
use funil_whatsapp::start_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Funil WhatsApp v{}", env!("CARGO_PKG_VERSION"));

    // Fail fast on missing credentials
    config.validate()?;

    // Start the HTTP server
    start_server(&config).await
}
