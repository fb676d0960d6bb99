use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::room::RoomId;

/// Sender identifier of a conversation (a phone-number-like string).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    CollectingCheckin,
    CollectingCheckout,
    CollectingGuests,
    AskingRoomType,
    QuoteReady,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectingCheckin => "COLLECTING_CHECKIN",
            Self::CollectingCheckout => "COLLECTING_CHECKOUT",
            Self::CollectingGuests => "COLLECTING_GUESTS",
            Self::AskingRoomType => "ASKING_ROOM_TYPE",
            Self::QuoteReady => "QUOTE_READY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "COLLECTING_CHECKIN" => Some(Self::CollectingCheckin),
            "COLLECTING_CHECKOUT" => Some(Self::CollectingCheckout),
            "COLLECTING_GUESTS" => Some(Self::CollectingGuests),
            "ASKING_ROOM_TYPE" => Some(Self::AskingRoomType),
            "QUOTE_READY" => Some(Self::QuoteReady),
            _ => None,
        }
    }
}

/// A check-in or check-out value. Text that looks like a date is kept as a
/// calendar date; anything else is kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StayDate {
    Date(NaiveDate),
    Raw(String),
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"];

impl StayDate {
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
            .map(Self::Date)
            .unwrap_or_else(|| Self::Raw(trimmed.to_string()))
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Raw(_) => None,
        }
    }
}

impl fmt::Display for StayDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Raw(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    pub check_in: Option<StayDate>,
    pub check_out: Option<StayDate>,
    pub guests: Option<u32>,
    pub room_type: Option<RoomId>,
}

impl Slots {
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.check_in.is_none() {
            missing.push("check_in".to_string());
        }
        if self.check_out.is_none() {
            missing.push("check_out".to_string());
        }
        if self.guests.is_none() {
            missing.push("guests".to_string());
        }
        if self.room_type.is_none() {
            missing.push("room_type".to_string());
        }
        missing
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub conversation_id: ConversationId,
    pub state: SessionState,
    pub slots: Slots,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(conversation_id: ConversationId, created_at: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            state: SessionState::CollectingCheckin,
            slots: Slots::default(),
            created_at,
        }
    }
}
