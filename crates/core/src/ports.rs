use async_trait::async_trait;
use thiserror::Error;

use crate::domain::reservation::Reservation;
use crate::domain::session::ConversationId;
use crate::payments::{PaymentError, PaymentEvent};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("messaging request failed: {0}")]
    Transport(String),
    #[error("messaging provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound text channel to a guest.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, to: &ConversationId, text: &str) -> Result<(), ChannelError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// Hosted checkout provider plus authentication of its webhooks.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout(&self, reservation: &Reservation)
        -> Result<CheckoutSession, PaymentError>;

    /// Authenticates a raw webhook body against its signature header and
    /// extracts the event.
    fn verify_and_parse(&self, payload: &[u8], signature: &str)
        -> Result<PaymentEvent, PaymentError>;
}
