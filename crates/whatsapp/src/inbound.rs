use serde_json::Value;

use innkeep_core::domain::session::ConversationId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: ConversationId,
    pub text: String,
}

/// Reduces a webhook body to sender and text.
///
/// Accepts the Gupshup message envelope
/// (`{"type":"message","payload":{"source":..,"payload":{"text":..}}}`, with
/// `payload.sender.phone` as an alternative sender) and the flat sandbox shape
/// `{"from":..,"text":..}`. Delivery receipts, status events and anything
/// without a sender or text yield `None`.
pub fn normalize_inbound(body: &Value) -> Option<InboundMessage> {
    gupshup_message(body).or_else(|| flat_message(body))
}

fn gupshup_message(body: &Value) -> Option<InboundMessage> {
    if body.get("type").and_then(Value::as_str) != Some("message") {
        return None;
    }
    let payload = body.get("payload")?;
    let sender = payload
        .get("source")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/sender/phone").and_then(Value::as_str))?;
    let text = payload.pointer("/payload/text").and_then(Value::as_str)?;
    build(sender, text)
}

fn flat_message(body: &Value) -> Option<InboundMessage> {
    let sender = body.get("from").and_then(Value::as_str)?;
    let text = body.get("text").and_then(Value::as_str)?;
    build(sender, text)
}

fn build(sender: &str, text: &str) -> Option<InboundMessage> {
    let sender = sender.trim();
    if sender.is_empty() {
        return None;
    }
    Some(InboundMessage { sender: ConversationId(sender.to_string()), text: text.to_string() })
}
