use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::room::{RoomId, UpsellId};
use crate::domain::session::{ConversationId, StayDate};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationId(pub String);

impl ReservationId {
    pub fn generate() -> Self {
        Self(format!("res_{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "PAID" => Some(Self::Paid),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsellLine {
    pub id: UpsellId,
    pub price_cents: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub phone: ConversationId,
    pub room_type: RoomId,
    pub check_in: StayDate,
    pub check_out: StayDate,
    pub nights: u32,
    pub price_cents: i64,
    pub total_cents: i64,
    #[serde(default)]
    pub upsells: Vec<UpsellLine>,
    pub payment_status: PaymentStatus,
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of applying a completed payment to a reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentTransition {
    Applied,
    AlreadyPaid,
}

impl Reservation {
    /// PAID is terminal; a reservation never returns to PENDING.
    pub fn mark_paid(&mut self) -> PaymentTransition {
        if self.payment_status == PaymentStatus::Paid {
            return PaymentTransition::AlreadyPaid;
        }
        self.payment_status = PaymentStatus::Paid;
        PaymentTransition::Applied
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}
