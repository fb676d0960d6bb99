//! Payment webhook authentication and event extraction.
//!
//! Webhooks carry a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The HMAC-SHA256 is computed with
//! the webhook secret over `"{t}.{raw body}"`.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::domain::reservation::ReservationId;

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("webhook secret is not configured")]
    MissingSecret,
    #[error("signature header is missing or malformed")]
    MalformedHeader,
    #[error("signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("no signature matched the payload")]
    Mismatch,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment provider is not configured: {0}")]
    NotConfigured(String),
    #[error("payment provider request failed: {0}")]
    Provider(String),
    #[error("payment provider response was not understood: {0}")]
    InvalidResponse(String),
    #[error("webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),
    #[error("webhook payload is not valid JSON: {0}")]
    Payload(String),
}

/// A verified webhook reduced to what booking confirmation needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentEvent {
    pub event_type: String,
    /// Only present for completed checkout sessions that carry our metadata.
    pub reservation_id: Option<ReservationId>,
}

impl PaymentEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }
}

#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance_secs: u64,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str, now_unix: i64) -> Result<(), SignatureError> {
        if self.secret.is_empty() {
            return Err(SignatureError::MissingSecret);
        }

        let parsed = SignatureHeader::parse(header)?;
        if now_unix.abs_diff(parsed.timestamp) > self.tolerance_secs {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        for candidate in &parsed.signatures {
            let Ok(expected) = hex::decode(candidate) else {
                continue;
            };
            let mac = self.mac_for(parsed.timestamp, payload)?;
            if mac.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
        Err(SignatureError::Mismatch)
    }

    /// Produces a header value for `payload`; used by tests and the CLI.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        if self.secret.is_empty() {
            return Err(SignatureError::MissingSecret);
        }
        let mac = self.mac_for(timestamp, payload)?;
        Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| SignatureError::MissingSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = value.parse::<i64>().ok(),
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }
        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self { timestamp, signatures }),
            _ => Err(SignatureError::MalformedHeader),
        }
    }
}

/// Extracts the event type and, for completed checkouts, the reservation id
/// stored in `data.object.metadata.reservation_id`.
pub fn parse_payment_event(payload: &[u8]) -> Result<PaymentEvent, PaymentError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|error| PaymentError::Payload(error.to_string()))?;
    let event_type = value.get("type").and_then(Value::as_str).unwrap_or_default().to_string();

    let reservation_id = if event_type == CHECKOUT_COMPLETED {
        value
            .pointer("/data/object/metadata/reservation_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(|id| ReservationId(id.to_string()))
    } else {
        None
    };

    Ok(PaymentEvent { event_type, reservation_id })
}
