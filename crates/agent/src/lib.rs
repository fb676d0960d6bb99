//! Conversation runtime for the booking assistant.
//!
//! The runtime owns the per-message loop:
//! 1. **Flow** - the booking state machine in `innkeep_core::flows` decides the
//!    next state and the actions to run
//! 2. **Side effects** (`runtime`) - replies, reservation creation and
//!    checkout hand-off, executed in order
//! 3. **Fallback** (`llm`) - free text outside the structured flow is answered
//!    from the knowledge base through a language model
//! 4. **Payments** (`payments`) - verified provider webhooks mark reservations
//!    paid and notify the guest
//!
//! The language model only phrases answers. Prices, states and payment
//! status are decided by the core.

pub mod llm;
pub mod notify;
pub mod payments;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use llm::{LlmClient, LlmError, OpenAiCompatibleClient, FALLBACK_REPLY};
pub use payments::{ConfirmationOutcome, PaymentConfirmationHandler};
pub use runtime::{ConversationRuntime, RuntimeComponents, TurnOutcome};
