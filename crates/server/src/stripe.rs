use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use innkeep_core::config::PaymentsConfig;
use innkeep_core::domain::reservation::Reservation;
use innkeep_core::payments::{
    parse_payment_event, PaymentError, PaymentEvent, SignatureError, SignatureVerifier,
};
use innkeep_core::ports::{CheckoutSession, PaymentProvider};

const CHECKOUT_SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Hosted Stripe Checkout plus verification of its webhooks.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    endpoint: String,
    secret_key: Option<SecretString>,
    verifier: Option<SignatureVerifier>,
    currency: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    id: String,
    url: Option<String>,
}

impl StripeClient {
    pub fn from_config(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| PaymentError::Provider(error.to_string()))?;

        let verifier = config
            .webhook_secret
            .as_ref()
            .map(|secret| secret.expose_secret().trim().to_string())
            .filter(|secret| !secret.is_empty())
            .map(|secret| SignatureVerifier::new(secret, config.signature_tolerance_secs));

        Ok(Self {
            client,
            endpoint: format!("{}/v1/checkout/sessions", config.api_base.trim_end_matches('/')),
            secret_key: config.secret_key.clone(),
            verifier,
            currency: config.currency.trim().to_ascii_lowercase(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Form fields for `POST /v1/checkout/sessions`. The stay is one line item
    /// billed `nights` times; upsells follow as single-quantity items.
    pub fn checkout_form(&self, reservation: &Reservation) -> Vec<(String, String)> {
        let mut form = vec![
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("mode".to_string(), "payment".to_string()),
            (
                "success_url".to_string(),
                format!("{}?session_id={CHECKOUT_SESSION_PLACEHOLDER}", self.success_url),
            ),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("metadata[reservation_id]".to_string(), reservation.id.0.clone()),
        ];

        let stay = format!("{} stay", reservation.room_type.0);
        self.push_line_item(&mut form, 0, &stay, reservation.price_cents, reservation.nights);
        for (offset, upsell) in reservation.upsells.iter().enumerate() {
            self.push_line_item(&mut form, offset + 1, &upsell.id.0, upsell.price_cents, 1);
        }
        form
    }

    fn push_line_item(
        &self,
        form: &mut Vec<(String, String)>,
        index: usize,
        name: &str,
        unit_amount: i64,
        quantity: u32,
    ) {
        let prefix = format!("line_items[{index}]");
        form.push((format!("{prefix}[price_data][currency]"), self.currency.clone()));
        form.push((format!("{prefix}[price_data][product_data][name]"), name.to_string()));
        form.push((format!("{prefix}[price_data][unit_amount]"), unit_amount.to_string()));
        form.push((format!("{prefix}[quantity]"), quantity.to_string()));
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout(
        &self,
        reservation: &Reservation,
    ) -> Result<CheckoutSession, PaymentError> {
        let secret_key = self
            .secret_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| PaymentError::NotConfigured("payments.secret_key is not set".to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(secret_key.expose_secret())
            .form(&self.checkout_form(reservation))
            .send()
            .await
            .map_err(|error| PaymentError::Provider(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "payments.stripe.rejected",
                reservation_id = %reservation.id,
                status = status.as_u16(),
                "stripe rejected checkout session"
            );
            return Err(PaymentError::Provider(format!(
                "status {}: {}",
                status.as_u16(),
                body.chars().take(500).collect::<String>()
            )));
        }

        let body: CheckoutResponse = response
            .json()
            .await
            .map_err(|error| PaymentError::InvalidResponse(error.to_string()))?;
        let url = body
            .url
            .ok_or_else(|| PaymentError::InvalidResponse("checkout session has no url".to_string()))?;

        info!(
            event_name = "payments.stripe.session_created",
            reservation_id = %reservation.id,
            payment_session_id = %body.id,
            "stripe checkout session created"
        );
        Ok(CheckoutSession { session_id: body.id, url })
    }

    fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentError> {
        let verifier = self.verifier.as_ref().ok_or(SignatureError::MissingSecret)?;
        verifier.verify(payload, signature, Utc::now().timestamp())?;
        parse_payment_event(payload)
    }
}
