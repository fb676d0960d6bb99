use tracing::warn;

use innkeep_core::domain::session::ConversationId;
use innkeep_core::ports::MessageSender;

/// Sends `text` and logs failures instead of returning them. Returns whether
/// the channel accepted the message.
pub async fn send_best_effort(
    sender: &dyn MessageSender,
    to: &ConversationId,
    text: &str,
    correlation_id: &str,
) -> bool {
    match sender.send(to, text).await {
        Ok(()) => true,
        Err(error) => {
            warn!(
                event_name = "channel.send_failed",
                correlation_id,
                conversation_id = %to,
                error = %error,
                "outbound message could not be delivered"
            );
            false
        }
    }
}
