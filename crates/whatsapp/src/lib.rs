//! WhatsApp channel adapter backed by the Gupshup HTTP API.
//!
//! - **Outbound** (`sender`) - `GupshupSender` implements `MessageSender`
//! - **Inbound** (`inbound`) - normalizes webhook payloads to `(sender, text)`

pub mod inbound;
pub mod sender;

pub use inbound::{normalize_inbound, InboundMessage};
pub use sender::GupshupSender;
