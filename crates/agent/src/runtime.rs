use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info};

use innkeep_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use innkeep_core::catalog::Retrieval;
use innkeep_core::domain::reservation::{PaymentStatus, Reservation, ReservationId};
use innkeep_core::domain::session::{ConversationId, SessionState};
use innkeep_core::errors::{ApplicationError, DomainError};
use innkeep_core::flows::{BookingFlow, FlowAction, FlowEngine};
use innkeep_core::ports::{MessageSender, PaymentProvider};
use innkeep_core::pricing::StayQuote;
use innkeep_db::repositories::{RepositoryError, ReservationStore, SessionStore};

use crate::llm::{reply_or_fallback, LlmClient};
use crate::notify::send_best_effort;

const RETRIEVAL_TOP_K: usize = 3;
const ACTOR: &str = "conversation-runtime";

pub struct RuntimeComponents {
    pub engine: FlowEngine<BookingFlow>,
    pub sessions: Arc<dyn SessionStore>,
    pub reservations: Arc<dyn ReservationStore>,
    pub sender: Arc<dyn MessageSender>,
    pub payments: Arc<dyn PaymentProvider>,
    pub llm: Arc<dyn LlmClient>,
    pub retrieval: Arc<dyn Retrieval>,
    pub audit: Arc<dyn AuditSink>,
}

/// What one inbound message produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub conversation_id: ConversationId,
    pub state: SessionState,
    /// Every message the runtime attempted to send, in order.
    pub replies: Vec<String>,
    pub reservation_id: Option<ReservationId>,
}

pub struct ConversationRuntime {
    engine: FlowEngine<BookingFlow>,
    sessions: Arc<dyn SessionStore>,
    reservations: Arc<dyn ReservationStore>,
    sender: Arc<dyn MessageSender>,
    payments: Arc<dyn PaymentProvider>,
    llm: Arc<dyn LlmClient>,
    retrieval: Arc<dyn Retrieval>,
    audit: Arc<dyn AuditSink>,
    locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

impl ConversationRuntime {
    pub fn new(components: RuntimeComponents) -> Self {
        Self {
            engine: components.engine,
            sessions: components.sessions,
            reservations: components.reservations,
            sender: components.sender,
            payments: components.payments,
            llm: components.llm,
            retrieval: components.retrieval,
            audit: components.audit,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &FlowEngine<BookingFlow> {
        &self.engine
    }

    /// Processes one inbound message to completion. Messages for the same
    /// conversation are handled one at a time.
    pub async fn handle_message(
        &self,
        conversation_id: ConversationId,
        text: &str,
        correlation_id: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let lock = self.conversation_lock(&conversation_id).await;
        let _guard = lock.lock().await;

        let audit = AuditContext::new(Some(conversation_id.clone()), correlation_id, ACTOR);
        let existing = self.sessions.find(&conversation_id).await.map_err(persistence)?;

        let (session, outcome) = match existing {
            None => {
                let (session, outcome) = self.engine.start(conversation_id.clone(), Utc::now());
                info!(
                    event_name = "conversation.session_created",
                    correlation_id,
                    conversation_id = %conversation_id,
                    "new conversation started"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &audit,
                        "conversation.session_created",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("to", session.state.as_str()),
                );
                (session, outcome)
            }
            Some(mut session) => {
                let outcome = self
                    .engine
                    .apply_with_audit(&mut session, text, self.audit.as_ref(), &audit)
                    .map_err(|error| ApplicationError::Domain(DomainError::from(error)))?;
                (session, outcome)
            }
        };

        self.sessions.save(&session).await.map_err(persistence)?;
        info!(
            event_name = "conversation.transition_applied",
            correlation_id,
            conversation_id = %conversation_id,
            from = outcome.from.map(|state| state.as_str()).unwrap_or("NEW"),
            to = outcome.to.as_str(),
            "conversation advanced"
        );

        let mut turn = TurnOutcome {
            conversation_id: conversation_id.clone(),
            state: session.state,
            replies: Vec::new(),
            reservation_id: None,
        };

        for action in outcome.actions {
            match action {
                FlowAction::Reply(text) => {
                    self.send(&conversation_id, &text, correlation_id).await;
                    turn.replies.push(text);
                }
                FlowAction::ConfirmBooking(quote) => {
                    let (reservation_id, link_message) =
                        self.confirm_booking(&conversation_id, &quote, &audit).await?;
                    turn.reservation_id = Some(reservation_id);
                    turn.replies.push(link_message);
                }
                FlowAction::AiFallback { text } => {
                    let reply = self.ai_reply(&text, correlation_id).await;
                    self.send(&conversation_id, &reply, correlation_id).await;
                    turn.replies.push(reply);
                }
            }
        }

        Ok(turn)
    }

    async fn conversation_lock(&self, conversation_id: &ConversationId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(conversation_id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn send(&self, to: &ConversationId, text: &str, correlation_id: &str) {
        send_best_effort(self.sender.as_ref(), to, text, correlation_id).await;
    }

    async fn ai_reply(&self, text: &str, correlation_id: &str) -> String {
        let snippets = self.retrieval.query(text, RETRIEVAL_TOP_K);
        reply_or_fallback(self.llm.as_ref(), text, &snippets, correlation_id).await
    }

    /// Persists a PENDING reservation, opens a checkout session, records the
    /// session id and sends the payment link. A checkout failure leaves the
    /// reservation PENDING without a session id and is returned to the caller.
    async fn confirm_booking(
        &self,
        conversation_id: &ConversationId,
        quote: &StayQuote,
        audit: &AuditContext,
    ) -> Result<(ReservationId, String), ApplicationError> {
        let mut reservation = Reservation {
            id: ReservationId::generate(),
            phone: conversation_id.clone(),
            room_type: quote.room.id.clone(),
            check_in: quote.check_in.clone(),
            check_out: quote.check_out.clone(),
            nights: quote.nights,
            price_cents: quote.price_cents,
            total_cents: quote.total_cents,
            upsells: Vec::new(),
            payment_status: PaymentStatus::Pending,
            payment_session_id: None,
            created_at: Utc::now(),
        };
        let audit = audit.clone().with_reservation(reservation.id.clone());
        let correlation_id = audit.correlation_id.as_str();

        self.reservations.save(&reservation).await.map_err(persistence)?;
        self.audit.emit(
            AuditEvent::new(
                &audit,
                "booking.reservation_created",
                AuditCategory::Booking,
                AuditOutcome::Success,
            )
            .with_metadata("total_cents", reservation.total_cents.to_string()),
        );

        let checkout = match self.payments.create_checkout(&reservation).await {
            Ok(checkout) => checkout,
            Err(payment_error) => {
                error!(
                    event_name = "booking.checkout_failed",
                    correlation_id,
                    conversation_id = %conversation_id,
                    reservation_id = %reservation.id,
                    error = %payment_error,
                    "checkout session creation failed; reservation left pending"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &audit,
                        "booking.checkout_failed",
                        AuditCategory::Booking,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", payment_error.to_string()),
                );
                return Err(ApplicationError::Integration(payment_error.to_string()));
            }
        };

        reservation.payment_session_id = Some(checkout.session_id.clone());
        self.reservations.save(&reservation).await.map_err(persistence)?;
        info!(
            event_name = "booking.checkout_created",
            correlation_id,
            conversation_id = %conversation_id,
            reservation_id = %reservation.id,
            payment_session_id = %checkout.session_id,
            "checkout session created"
        );
        self.audit.emit(
            AuditEvent::new(
                &audit,
                "booking.checkout_created",
                AuditCategory::Booking,
                AuditOutcome::Success,
            )
            .with_metadata("payment_session_id", checkout.session_id),
        );

        let message = format!("Here is your secure payment link: {}", checkout.url);
        self.send(conversation_id, &message, correlation_id).await;
        Ok((reservation.id, message))
    }
}
