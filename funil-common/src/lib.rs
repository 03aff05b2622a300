//! Funil Common - Shared configuration and logging for the Funil services.
//!
//! This crate provides:
//! - Configuration types and loading (JSON file + environment overrides)
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;

pub use config::{Config, ObservabilityConfig, ServerConfig, WhatsAppConfig};
pub use logging::init_logging;
