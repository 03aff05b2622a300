//! Funil Core - Conversation state and menu routing for the Funil responder.
//!
//! This crate holds everything that is independent of the wire transport:
//! - The per-sender session registry with inactivity auto-close
//! - The fixed menu funnel (routing rules and reply texts)
//! - The dispatcher that turns one inbound message into one reply
//! - The inbound router that serializes handling per sender
//!
//! ```text
//! transport → InboundRouter → Dispatcher → SessionRegistry
//!                                 ↓              ↓ (idle timeout)
//!            reply ← Transport ←─┴──────── IdleNotifier
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod dispatch;
pub mod menu;
pub mod message;
pub mod router;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use dispatch::{Dispatcher, IdleCloser, TYPING_DELAY};
pub use menu::MenuRoute;
pub use message::InboundMessage;
pub use router::InboundRouter;
pub use session::{IdleNotifier, SessionRegistry, INACTIVITY_WINDOW};
pub use transport::{Transport, TransportError, TransportResult};
