use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::Catalog;
use crate::domain::room::RoomId;
use crate::domain::session::{ConversationId, Session, SessionState, Slots, StayDate};
use crate::flows::states::{FlowAction, TransitionOutcome};
use crate::pricing::{quote_message, quote_stay, PricingError};

pub const CHECKIN_PROMPT: &str =
    "Welcome! To book a room, please send your check-in date (YYYY-MM-DD).";
pub const CHECKOUT_PROMPT: &str = "Thanks! Now send your check-out date (YYYY-MM-DD).";
pub const GUESTS_PROMPT: &str = "How many guests?";
pub const GUESTS_REPROMPT: &str = "Please send the number of guests as a number, for example 2.";
pub const NO_ROOMS_MESSAGE: &str = "Sorry, no rooms are available to book right now.";

const AFFIRMATIVE_TOKENS: [&str; 3] = ["yes", "pay", "ok"];

pub trait FlowDefinition {
    fn initial_state(&self) -> SessionState;
    /// Greeting sent when a conversation is seen for the first time.
    fn opening(&self) -> Vec<FlowAction>;
    fn transition(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Slot-filling flow for a single room booking.
#[derive(Clone, Debug)]
pub struct BookingFlow {
    catalog: Arc<Catalog>,
    currency: String,
}

impl BookingFlow {
    pub fn new(catalog: Arc<Catalog>, currency: impl Into<String>) -> Self {
        Self { catalog, currency: currency.into() }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl FlowDefinition for BookingFlow {
    fn initial_state(&self) -> SessionState {
        SessionState::CollectingCheckin
    }

    fn opening(&self) -> Vec<FlowAction> {
        vec![FlowAction::Reply(CHECKIN_PROMPT.to_string())]
    }

    fn transition(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_booking(self, session, text)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// Creates the session for a first-time sender. The inbound text is not
    /// interpreted.
    pub fn start(
        &self,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
    ) -> (Session, TransitionOutcome) {
        let mut session = Session::new(conversation_id, now);
        session.state = self.flow.initial_state();
        let outcome = TransitionOutcome {
            from: None,
            to: session.state,
            slots: session.slots.clone(),
            actions: self.flow.opening(),
        };
        (session, outcome)
    }

    /// Runs one transition and writes the resulting state and slots back
    /// into `session`. On error the session is left untouched.
    pub fn apply(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let outcome = self.flow.transition(session, text)?;
        session.state = outcome.to;
        session.slots = outcome.slots.clone();
        Ok(outcome)
    }

    pub fn apply_with_audit<S>(
        &self,
        session: &mut Session,
        text: &str,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(session, text);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "conversation.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", state_label(outcome.from))
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("actions", outcome.actions.len().to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "conversation.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("state", session.state.as_str())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

fn state_label(state: Option<SessionState>) -> &'static str {
    state.map(|state| state.as_str()).unwrap_or("NEW")
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields in state {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: SessionState, missing_fields: Vec<String> },
    #[error("session references room `{room_id}` which is not in the catalog")]
    UnknownRoom { room_id: RoomId },
}

impl FlowTransitionError {
    fn from_pricing(state: SessionState, error: PricingError) -> Self {
        match error {
            PricingError::IncompleteSlots(missing_fields) => {
                Self::MissingRequiredFields { state, missing_fields }
            }
            PricingError::UnknownRoom(room_id) => Self::UnknownRoom { room_id },
        }
    }
}

fn transition_booking(
    flow: &BookingFlow,
    session: &Session,
    text: &str,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use SessionState::{
        AskingRoomType, CollectingCheckin, CollectingCheckout, CollectingGuests, QuoteReady,
    };

    let current = session.state;
    let mut slots = session.slots.clone();
    let trimmed = text.trim();

    let (to, actions) = match current {
        CollectingCheckin if trimmed.is_empty() => (current, reply(CHECKIN_PROMPT)),
        CollectingCheckin => {
            slots.check_in = Some(StayDate::from_text(trimmed));
            (CollectingCheckout, reply(CHECKOUT_PROMPT))
        }
        CollectingCheckout if trimmed.is_empty() => (current, reply(CHECKOUT_PROMPT)),
        CollectingCheckout => {
            slots.check_out = Some(StayDate::from_text(trimmed));
            (CollectingGuests, reply(GUESTS_PROMPT))
        }
        CollectingGuests => match parse_guest_count(trimmed) {
            Some(guests) => {
                slots.guests = Some(guests);
                (AskingRoomType, reply(&room_prompt(flow.catalog())))
            }
            None => (current, reply(GUESTS_REPROMPT)),
        },
        AskingRoomType => match flow.catalog().find_room(trimmed) {
            Some(room) => {
                slots.room_type = Some(room.id.clone());
                let quote = quote_stay(flow.catalog(), &slots)
                    .map_err(|error| FlowTransitionError::from_pricing(current, error))?;
                (QuoteReady, reply(&quote_message(&quote, flow.currency())))
            }
            None => (current, reply(&room_reprompt(flow.catalog()))),
        },
        QuoteReady if is_affirmative(trimmed) => {
            let quote = quote_stay(flow.catalog(), &slots)
                .map_err(|error| FlowTransitionError::from_pricing(current, error))?;
            (QuoteReady, vec![FlowAction::ConfirmBooking(quote)])
        }
        QuoteReady => (QuoteReady, vec![FlowAction::AiFallback { text: text.to_string() }]),
    };

    Ok(TransitionOutcome { from: Some(current), to, slots, actions })
}

fn reply(text: &str) -> Vec<FlowAction> {
    vec![FlowAction::Reply(text.to_string())]
}

/// Guest counts must be a positive whole number.
pub fn parse_guest_count(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|guests| *guests > 0)
}

pub fn is_affirmative(text: &str) -> bool {
    let normalized = text.trim().trim_end_matches(['.', '!']).to_lowercase();
    AFFIRMATIVE_TOKENS.contains(&normalized.as_str())
}

fn room_prompt(catalog: &Catalog) -> String {
    if catalog.rooms().is_empty() {
        return NO_ROOMS_MESSAGE.to_string();
    }
    format!("Which room would you like? Options: {}.", catalog.room_names().join(", "))
}

fn room_reprompt(catalog: &Catalog) -> String {
    if catalog.rooms().is_empty() {
        return NO_ROOMS_MESSAGE.to_string();
    }
    format!(
        "Sorry, I couldn't find that room. Please choose one of: {}.",
        catalog.room_names().join(", ")
    )
}
