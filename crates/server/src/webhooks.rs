//! HTTP ingress for the messaging and payment providers.
//!
//! - `GET  /`                 liveness probe
//! - `POST /webhook/whatsapp` inbound guest messages
//! - `POST /webhook/stripe`   payment provider events (signed)

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use innkeep_agent::{ConfirmationOutcome, ConversationRuntime, PaymentConfirmationHandler};
use innkeep_core::errors::{ApplicationError, InterfaceError};
use innkeep_whatsapp::normalize_inbound;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone)]
pub struct WebhookState {
    pub runtime: Arc<ConversationRuntime>,
    pub confirmations: Arc<PaymentConfirmationHandler>,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/webhook/whatsapp", post(whatsapp_webhook))
        .route("/webhook/stripe", post(stripe_webhook))
        .with_state(state)
}

/// Error body returned to providers. Internal detail stays in the logs.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.user_message(),
            "correlation_id": self.0.correlation_id(),
        });
        (status, Json(body)).into_response()
    }
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

pub async fn root() -> Json<Value> {
    Json(json!({"status": "running"}))
}

/// Accepts any provider payload. Payloads that are not guest text messages
/// are acknowledged and dropped so the provider does not retry them.
pub async fn whatsapp_webhook(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = correlation_id();
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(parse_error) => {
            warn!(
                event_name = "ingress.whatsapp.unparseable",
                correlation_id = %correlation_id,
                error = %parse_error,
                "inbound webhook body is not JSON; ignoring"
            );
            return Ok(Json(json!({"ok": true})));
        }
    };

    let Some(message) = normalize_inbound(&payload) else {
        info!(
            event_name = "ingress.whatsapp.ignored",
            correlation_id = %correlation_id,
            "inbound webhook carried no text message"
        );
        return Ok(Json(json!({"ok": true})));
    };

    info!(
        event_name = "ingress.whatsapp.message_received",
        correlation_id = %correlation_id,
        conversation_id = %message.sender,
        "inbound whatsapp message"
    );

    match state.runtime.handle_message(message.sender, &message.text, &correlation_id).await {
        Ok(_) => Ok(Json(json!({"ok": true}))),
        Err(app_error) => {
            error!(
                event_name = "ingress.whatsapp.failed",
                correlation_id = %correlation_id,
                error = %app_error,
                "inbound message processing failed"
            );
            Err(ApiError::from_application(app_error, &correlation_id))
        }
    }
}

pub async fn stripe_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = correlation_id();
    let signature =
        headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok()).unwrap_or_default();

    let outcome = state
        .confirmations
        .handle(&body, signature, &correlation_id)
        .await
        .map_err(|app_error| {
            warn!(
                event_name = "ingress.stripe.failed",
                correlation_id = %correlation_id,
                error = %app_error,
                "payment webhook rejected"
            );
            ApiError::from_application(app_error, &correlation_id)
        })?;

    let label = match outcome {
        ConfirmationOutcome::Confirmed(_) => "confirmed",
        ConfirmationOutcome::AlreadyPaid(_) => "already_paid",
        ConfirmationOutcome::UnknownReservation(_) => "unknown_reservation",
        ConfirmationOutcome::Ignored { .. } => "ignored",
    };
    Ok(Json(json!({"ok": true, "outcome": label})))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::Bytes,
        extract::State,
        http::{HeaderMap, HeaderValue, StatusCode},
        response::IntoResponse,
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use innkeep_agent::{
        ConversationRuntime, LlmClient, LlmError, PaymentConfirmationHandler, RuntimeComponents,
    };
    use innkeep_core::audit::InMemoryAuditSink;
    use innkeep_core::catalog::KnowledgeBase;
    use innkeep_core::domain::reservation::{PaymentStatus, ReservationId};
    use innkeep_core::domain::room::{Room, RoomId};
    use innkeep_core::domain::session::{ConversationId, SessionState};
    use innkeep_core::flows::{BookingFlow, FlowEngine};
    use innkeep_core::payments::{
        parse_payment_event, PaymentError, PaymentEvent, SignatureVerifier,
    };
    use innkeep_core::ports::{ChannelError, CheckoutSession, MessageSender, PaymentProvider};
    use innkeep_core::Catalog;
    use innkeep_db::repositories::{
        InMemoryReservationStore, InMemorySessionStore, ReservationStore, SessionStore,
    };

    use super::{root, stripe_webhook, whatsapp_webhook, WebhookState, SIGNATURE_HEADER};

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, _to: &ConversationId, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().expect("lock").push(text.to_string());
            Ok(())
        }
    }

    struct StubPayments(SignatureVerifier);

    #[async_trait]
    impl PaymentProvider for StubPayments {
        async fn create_checkout(
            &self,
            reservation: &innkeep_core::Reservation,
        ) -> Result<CheckoutSession, PaymentError> {
            Ok(CheckoutSession {
                session_id: format!("cs_{}", reservation.id),
                url: "https://checkout.test/pay".to_string(),
            })
        }

        fn verify_and_parse(
            &self,
            payload: &[u8],
            signature: &str,
        ) -> Result<PaymentEvent, PaymentError> {
            self.0.verify(payload, signature, Utc::now().timestamp())?;
            parse_payment_event(payload)
        }
    }

    struct SilentLlm;

    #[async_trait]
    impl LlmClient for SilentLlm {
        async fn reply(&self, _text: &str, _context: &[String]) -> Result<String, LlmError> {
            Err(LlmError::NotConfigured("test".to_string()))
        }
    }

    struct Fixture {
        state: WebhookState,
        sessions: Arc<InMemorySessionStore>,
        reservations: Arc<InMemoryReservationStore>,
        sender: Arc<RecordingSender>,
    }

    fn fixture() -> Fixture {
        let knowledge = KnowledgeBase {
            rooms: vec![Room {
                id: RoomId("deluxe".to_string()),
                name: "Deluxe Suite".to_string(),
                description: "Sea view".to_string(),
                price: Decimal::from(120),
            }],
            ..KnowledgeBase::default()
        };
        let sessions = Arc::new(InMemorySessionStore::default());
        let reservations = Arc::new(InMemoryReservationStore::default());
        let sender = Arc::new(RecordingSender::default());
        let payments = Arc::new(StubPayments(SignatureVerifier::new("whsec_test", 300)));
        let audit = Arc::new(InMemoryAuditSink::default());

        let runtime = ConversationRuntime::new(RuntimeComponents {
            engine: FlowEngine::new(BookingFlow::new(
                Arc::new(Catalog::from_knowledge(&knowledge)),
                "eur",
            )),
            sessions: sessions.clone(),
            reservations: reservations.clone(),
            sender: sender.clone(),
            payments: payments.clone(),
            llm: Arc::new(SilentLlm),
            retrieval: Arc::new(knowledge),
            audit: audit.clone(),
        });
        let confirmations = PaymentConfirmationHandler::new(
            reservations.clone(),
            sender.clone(),
            payments,
            audit,
            "eur",
        );

        Fixture {
            state: WebhookState {
                runtime: Arc::new(runtime),
                confirmations: Arc::new(confirmations),
            },
            sessions,
            reservations,
            sender,
        }
    }

    fn gupshup(text: &str) -> Bytes {
        Bytes::from(
            serde_json::to_vec(&json!({
                "type": "message",
                "payload": {"source": "4915100000", "type": "text", "payload": {"text": text}}
            }))
            .expect("payload"),
        )
    }

    #[tokio::test]
    async fn root_reports_running() {
        let axum::Json(body) = root().await;
        assert_eq!(body, json!({"status": "running"}));
    }

    #[tokio::test]
    async fn non_message_payloads_are_acknowledged() {
        let fixture = fixture();

        for body in [&b"not json"[..], &br#"{"type":"message-event"}"#[..]] {
            let axum::Json(reply) =
                whatsapp_webhook(State(fixture.state.clone()), Bytes::from_static(body))
                    .await
                    .expect("acknowledged");
            assert_eq!(reply, json!({"ok": true}));
        }
        assert!(fixture.sessions.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn booking_then_signed_payment_confirms_reservation() {
        let fixture = fixture();
        for text in ["hi", "2024-01-10", "2024-01-12", "2", "deluxe", "yes"] {
            whatsapp_webhook(State(fixture.state.clone()), gupshup(text)).await.expect("turn");
        }

        let session = fixture
            .sessions
            .find(&ConversationId("4915100000".to_string()))
            .await
            .expect("find")
            .expect("session");
        assert_eq!(session.state, SessionState::QuoteReady);
        let reservations = fixture.reservations.load_all().await.expect("load");
        assert_eq!(reservations.len(), 1);
        let reservation_id: ReservationId =
            reservations.keys().next().cloned().expect("reservation id");

        let payload = serde_json::to_vec(&json!({
            "type": "checkout.session.completed",
            "data": {"object": {"metadata": {"reservation_id": reservation_id.0}}}
        }))
        .expect("payload");
        let signature = SignatureVerifier::new("whsec_test", 300)
            .sign(&payload, Utc::now().timestamp())
            .expect("sign");
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).expect("header"));

        let axum::Json(reply) =
            stripe_webhook(State(fixture.state.clone()), headers, Bytes::from(payload))
                .await
                .expect("confirmed");
        assert_eq!(reply, json!({"ok": true, "outcome": "confirmed"}));

        let stored = fixture
            .reservations
            .find(&reservation_id)
            .await
            .expect("find")
            .expect("reservation");
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        let sent = fixture.sender.sent.lock().expect("lock").clone();
        assert!(sent.iter().any(|text| text.starts_with("Payment received!")));
    }

    #[tokio::test]
    async fn unsigned_payment_webhook_is_unauthorized() {
        let fixture = fixture();

        let error = stripe_webhook(
            State(fixture.state.clone()),
            HeaderMap::new(),
            Bytes::from_static(br#"{"type":"checkout.session.completed"}"#),
        )
        .await
        .expect_err("rejected");

        assert_eq!(error.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
