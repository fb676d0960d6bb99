use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, warn};

use innkeep_core::config::WhatsAppConfig;
use innkeep_core::domain::session::ConversationId;
use innkeep_core::ports::{ChannelError, MessageSender};

const CHANNEL: &str = "whatsapp";

#[derive(Clone)]
struct Credentials {
    api_key: SecretString,
    source_number: String,
}

/// Sends text messages through Gupshup. Without credentials every send is
/// logged and reported as delivered.
#[derive(Clone)]
pub struct GupshupSender {
    client: Client,
    endpoint: String,
    credentials: Option<Credentials>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct OutboundMessage<'a> {
    channel: &'a str,
    source: &'a str,
    destination: &'a str,
    message: TextBody<'a>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct TextBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

impl GupshupSender {
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ChannelError::Transport(error.to_string()))?;

        let credentials = match (&config.api_key, &config.source_number) {
            (Some(api_key), Some(source_number))
                if !api_key.expose_secret().trim().is_empty()
                    && !source_number.trim().is_empty() =>
            {
                Some(Credentials { api_key: api_key.clone(), source_number: source_number.clone() })
            }
            _ => None,
        };

        Ok(Self {
            client,
            endpoint: format!("{}/v1/message", config.api_base.trim_end_matches('/')),
            credentials,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.credentials.is_none()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MessageSender for GupshupSender {
    async fn send(&self, to: &ConversationId, text: &str) -> Result<(), ChannelError> {
        let Some(credentials) = &self.credentials else {
            info!(
                event_name = "channel.whatsapp.dry_run",
                conversation_id = %to,
                text,
                "whatsapp credentials missing; would send message"
            );
            return Ok(());
        };

        let body = OutboundMessage {
            channel: CHANNEL,
            source: &credentials.source_number,
            destination: &to.0,
            message: TextBody { kind: "text", text },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", credentials.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| ChannelError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "channel.whatsapp.rejected",
                conversation_id = %to,
                status = status.as_u16(),
                "gupshup rejected outbound message"
            );
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(1000).collect(),
            });
        }

        info!(
            event_name = "channel.whatsapp.sent",
            conversation_id = %to,
            status = status.as_u16(),
            "whatsapp message sent"
        );
        Ok(())
    }
}
