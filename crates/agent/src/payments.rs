use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use innkeep_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use innkeep_core::domain::reservation::{PaymentTransition, Reservation, ReservationId};
use innkeep_core::errors::ApplicationError;
use innkeep_core::payments::PaymentError;
use innkeep_core::ports::{MessageSender, PaymentProvider};
use innkeep_core::pricing::format_money;
use innkeep_db::repositories::ReservationStore;

use crate::notify::send_best_effort;

const ACTOR: &str = "payment-confirmation";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// A reservation moved from PENDING to PAID and the guest was notified.
    Confirmed(ReservationId),
    AlreadyPaid(ReservationId),
    UnknownReservation(ReservationId),
    /// Verified, but not a completed checkout carrying a reservation id.
    Ignored { event_type: String },
}

pub fn confirmation_message(reservation: &Reservation, currency: &str) -> String {
    format!(
        "Payment received! Your booking from {} to {} is confirmed. Total paid: {}.",
        reservation.check_in,
        reservation.check_out,
        format_money(reservation.total_cents, currency)
    )
}

pub struct PaymentConfirmationHandler {
    reservations: Arc<dyn ReservationStore>,
    sender: Arc<dyn MessageSender>,
    payments: Arc<dyn PaymentProvider>,
    audit: Arc<dyn AuditSink>,
    currency: String,
    // Serializes read-modify-write of the ledger across webhook deliveries.
    lock: Mutex<()>,
}

impl PaymentConfirmationHandler {
    pub fn new(
        reservations: Arc<dyn ReservationStore>,
        sender: Arc<dyn MessageSender>,
        payments: Arc<dyn PaymentProvider>,
        audit: Arc<dyn AuditSink>,
        currency: impl Into<String>,
    ) -> Self {
        Self { reservations, sender, payments, audit, currency: currency.into(), lock: Mutex::new(()) }
    }

    /// Verifies a raw provider webhook and applies it to the ledger. Failed
    /// verification never touches stored reservations.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: &str,
        correlation_id: &str,
    ) -> Result<ConfirmationOutcome, ApplicationError> {
        let audit = AuditContext::new(None, correlation_id, ACTOR);

        let event = match self.payments.verify_and_parse(payload, signature) {
            Ok(event) => event,
            Err(PaymentError::Payload(message)) => {
                warn!(
                    event_name = "payment.payload_invalid",
                    correlation_id,
                    error = %message,
                    "verified payment webhook could not be parsed"
                );
                return Err(ApplicationError::InvalidInput(message));
            }
            Err(error) => {
                warn!(
                    event_name = "payment.rejected",
                    correlation_id,
                    error = %error,
                    "payment webhook failed verification"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &audit,
                        "payment.rejected",
                        AuditCategory::Payment,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
                return Err(ApplicationError::Unauthorized(error.to_string()));
            }
        };

        let reservation_id = match (event.is_checkout_completed(), event.reservation_id) {
            (true, Some(reservation_id)) => reservation_id,
            _ => {
                info!(
                    event_name = "payment.event_ignored",
                    correlation_id,
                    event_type = %event.event_type,
                    "payment event does not confirm a reservation"
                );
                return Ok(ConfirmationOutcome::Ignored { event_type: event.event_type });
            }
        };
        let audit = audit.with_reservation(reservation_id.clone());

        let _guard = self.lock.lock().await;
        let found = self
            .reservations
            .find(&reservation_id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        let Some(mut reservation) = found else {
            warn!(
                event_name = "payment.ignored",
                correlation_id,
                reservation_id = %reservation_id,
                "payment references an unknown reservation"
            );
            self.audit.emit(
                AuditEvent::new(&audit, "payment.ignored", AuditCategory::Payment, AuditOutcome::Success)
                    .with_metadata("reason", "unknown_reservation"),
            );
            return Ok(ConfirmationOutcome::UnknownReservation(reservation_id));
        };

        if reservation.mark_paid() == PaymentTransition::AlreadyPaid {
            info!(
                event_name = "payment.ignored",
                correlation_id,
                reservation_id = %reservation_id,
                "reservation already paid"
            );
            self.audit.emit(
                AuditEvent::new(&audit, "payment.ignored", AuditCategory::Payment, AuditOutcome::Success)
                    .with_metadata("reason", "already_paid"),
            );
            return Ok(ConfirmationOutcome::AlreadyPaid(reservation_id));
        }

        self.reservations
            .save(&reservation)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        let message = confirmation_message(&reservation, &self.currency);
        send_best_effort(self.sender.as_ref(), &reservation.phone, &message, correlation_id).await;

        info!(
            event_name = "payment.confirmed",
            correlation_id,
            conversation_id = %reservation.phone,
            reservation_id = %reservation_id,
            "reservation marked paid"
        );
        self.audit.emit(
            AuditEvent::new(&audit, "payment.confirmed", AuditCategory::Payment, AuditOutcome::Success)
                .with_metadata("total_cents", reservation.total_cents.to_string()),
        );
        Ok(ConfirmationOutcome::Confirmed(reservation_id))
    }
}
