//! Configuration management for the Funil services.
//!
//! Configuration lives in a single JSON file at `~/.funil/config.json`
//! (overridable via `FUNIL_CONFIG`).
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PORT` → server.port (hosting providers inject this one)
//! - `FUNIL_HOST` → server.host
//! - `WHATSAPP_ACCESS_TOKEN` → whatsapp.access_token
//! - `WHATSAPP_PHONE_NUMBER_ID` → whatsapp.phone_number_id
//! - `WHATSAPP_VERIFY_TOKEN` → whatsapp.verify_token
//! - `WHATSAPP_APP_SECRET` → whatsapp.app_secret
//! - `FUNIL_LOG_LEVEL` → observability.log_level
//! - `FUNIL_LOG_FORMAT` → observability.log_format

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".funil"),
        |dirs| dirs.home_dir().join(".funil"),
    )
}

/// Get the configuration file path.
///
/// `FUNIL_CONFIG` overrides the default location.
pub fn config_path() -> PathBuf {
    std::env::var("FUNIL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default "0.0.0.0" so platform health probes reach us.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port for the webhook and liveness endpoints.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

// ============================================================================
// WhatsApp Cloud API Configuration
// ============================================================================

/// WhatsApp Business Cloud API credentials.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WhatsAppConfig {
    /// Permanent access token for the Business account
    #[serde(default)]
    pub access_token: String,

    /// Phone number ID the bot sends from
    #[serde(default)]
    pub phone_number_id: String,

    /// Token echoed back during the webhook verification handshake
    #[serde(default)]
    pub verify_token: String,

    /// App secret for webhook payload signature verification.
    /// Signature checks are skipped when unset.
    #[serde(default)]
    pub app_secret: Option<String>,
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the Funil services.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// WhatsApp Cloud API credentials
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, then apply environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::info!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("FUNIL_HOST") {
            self.server.host = host;
        }

        if let Ok(token) = std::env::var("WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = token;
        }
        if let Ok(id) = std::env::var("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = id;
        }
        if let Ok(token) = std::env::var("WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = token;
        }
        if let Ok(secret) = std::env::var("WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = Some(secret);
        }

        if let Ok(level) = std::env::var("FUNIL_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("FUNIL_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Check that everything the WhatsApp adapter needs is present.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.whatsapp.access_token.is_empty(),
            "whatsapp.access_token is required (or set WHATSAPP_ACCESS_TOKEN)"
        );
        ensure!(
            !self.whatsapp.phone_number_id.is_empty(),
            "whatsapp.phone_number_id is required (or set WHATSAPP_PHONE_NUMBER_ID)"
        );
        ensure!(
            !self.whatsapp.verify_token.is_empty(),
            "whatsapp.verify_token is required (or set WHATSAPP_VERIFY_TOKEN)"
        );
        Ok(())
    }
}
