use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use innkeep_core::audit::AuditSink;
use innkeep_core::catalog::{Faq, KnowledgeBase};
use innkeep_core::domain::reservation::Reservation;
use innkeep_core::domain::room::{Room, RoomId, Upsell, UpsellId};
use innkeep_core::domain::session::ConversationId;
use innkeep_core::flows::{BookingFlow, FlowEngine};
use innkeep_core::payments::{parse_payment_event, PaymentError, PaymentEvent, SignatureVerifier};
use innkeep_core::ports::{ChannelError, CheckoutSession, MessageSender, PaymentProvider};
use innkeep_core::Catalog;
use innkeep_db::repositories::{ReservationStore, SessionStore};

use crate::llm::{LlmClient, LlmError};
use crate::runtime::RuntimeComponents;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn knowledge() -> KnowledgeBase {
    KnowledgeBase {
        rooms: vec![
            Room {
                id: RoomId("deluxe".to_string()),
                name: "Deluxe Suite".to_string(),
                description: "Sea view with balcony".to_string(),
                price: Decimal::from(120),
            },
            Room {
                id: RoomId("std".to_string()),
                name: "Standard Double".to_string(),
                description: "Courtyard view".to_string(),
                price: Decimal::from(80),
            },
        ],
        faqs: vec![Faq {
            q: "Is there parking?".to_string(),
            a: "Free parking behind the hotel.".to_string(),
        }],
        upsells: vec![Upsell {
            id: UpsellId("breakfast".to_string()),
            name: "Breakfast".to_string(),
            price: Decimal::from(15),
        }],
    }
}

pub fn runtime_components(
    sessions: Arc<dyn SessionStore>,
    reservations: Arc<dyn ReservationStore>,
    sender: Arc<dyn MessageSender>,
    payments: Arc<dyn PaymentProvider>,
    llm: Arc<dyn LlmClient>,
    audit: Arc<dyn AuditSink>,
) -> RuntimeComponents {
    let knowledge = knowledge();
    let catalog = Arc::new(Catalog::from_knowledge(&knowledge));
    RuntimeComponents {
        engine: FlowEngine::new(BookingFlow::new(catalog, "eur")),
        sessions,
        reservations,
        sender,
        payments,
        llm,
        retrieval: Arc::new(knowledge),
        audit,
    }
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(ConversationId, String)>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ConversationId, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, to: &ConversationId, text: &str) -> Result<(), ChannelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Rejected { status: 503, body: "unavailable".to_string() });
        }
        self.sent.lock().expect("sender lock").push((to.clone(), text.to_string()));
        Ok(())
    }
}

/// Checkout fake that hands out `cs_test_<n>` sessions and verifies webhooks
/// with [`WEBHOOK_SECRET`].
pub struct FakePayments {
    fail_checkout: bool,
    issued: AtomicUsize,
    verifier: SignatureVerifier,
}

impl FakePayments {
    pub fn succeeding() -> Self {
        Self {
            fail_checkout: false,
            issued: AtomicUsize::new(0),
            verifier: SignatureVerifier::new(WEBHOOK_SECRET, 300),
        }
    }

    pub fn failing() -> Self {
        Self { fail_checkout: true, ..Self::succeeding() }
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        self.verifier.sign(payload, Utc::now().timestamp()).expect("sign payload")
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_checkout(
        &self,
        _reservation: &Reservation,
    ) -> Result<CheckoutSession, PaymentError> {
        if self.fail_checkout {
            return Err(PaymentError::Provider("status 500".to_string()));
        }
        let number = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CheckoutSession {
            session_id: format!("cs_test_{number}"),
            url: format!("https://checkout.test/cs_test_{number}"),
        })
    }

    fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentError> {
        self.verifier.verify(payload, signature, Utc::now().timestamp())?;
        parse_payment_event(payload)
    }
}

pub struct ScriptedLlm {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { reply: None, prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn reply(&self, user_text: &str, _context: &[String]) -> Result<String, LlmError> {
        self.prompts.lock().expect("prompt lock").push(user_text.to_string());
        self.reply.clone().ok_or(LlmError::Status { status: 500 })
    }
}
