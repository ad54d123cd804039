use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, info};

use crate::domain::{
    repositories::payment_gateway::PaymentGateway,
    value_objects::payments::{
        CaptureOutcome, IntentRequest, PaymentEvent, PaymentIntentModel, RefundOutcome,
    },
};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
/// Signed webhook payloads older than this are refused.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: Option<String>,
    pub amount: Option<i64>,
    pub amount_received: Option<i64>,
    pub client_secret: Option<String>,
    pub currency: Option<String>,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentError {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        idempotency_key: Option<String>,
        context: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let resp = request.send().await?;
        Self::ensure_success(resp, context).await
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        now_unix: i64,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in stripe-signature"))?;
        if signatures.is_empty() {
            bail!("missing v1 in stripe-signature");
        }

        let signed_at: i64 = timestamp.parse()?;
        if (now_unix - signed_at).abs() > WEBHOOK_TOLERANCE_SECS {
            bail!("webhook timestamp outside tolerance");
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let verified = signatures.iter().any(|signature| {
            hex::decode(signature)
                .map(|provided| mac.clone().verify_slice(&provided).is_ok())
                .unwrap_or(false)
        });
        if !verified {
            bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    /// Maps the payment intent events the booking engine consumes.
    pub fn payment_event(event: &StripeEvent) -> Result<PaymentEvent> {
        match event.type_.as_str() {
            "payment_intent.amount_capturable_updated" | "payment_intent.succeeded" => {
                let intent: StripePaymentIntent =
                    serde_json::from_value(event.data.object.clone())?;
                Ok(PaymentEvent::Authorized {
                    intent_ref: intent.id,
                })
            }
            "payment_intent.payment_failed" | "payment_intent.canceled" => {
                let intent: StripePaymentIntent =
                    serde_json::from_value(event.data.object.clone())?;
                Ok(PaymentEvent::Failed {
                    intent_ref: intent.id,
                    reason: intent.last_payment_error.and_then(|e| e.message),
                })
            }
            other => Ok(PaymentEvent::Ignored {
                event_type: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntentModel> {
        let booking_id = request.booking_id;
        // https://stripe.com/docs/payments/place-a-hold-on-a-payment-method
        let mut body = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.to_ascii_lowercase()),
            ("capture_method".to_string(), "manual".to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            ("metadata[booking_id]".to_string(), booking_id.to_string()),
        ];
        if let Some(previous) = &request.previous_intent_ref {
            body.push(("metadata[replaces]".to_string(), previous.clone()));
        }

        let resp = self
            .post_form(
                "/payment_intents",
                &body,
                Some(request.idempotency_key()),
                "create payment intent",
            )
            .await?;
        let intent: StripePaymentIntent = resp.json().await?;

        info!(%booking_id, intent_ref = %intent.id, "stripe: payment intent created");

        Ok(PaymentIntentModel {
            intent_ref: intent.id,
            client_secret: intent.client_secret,
            amount_minor: intent.amount.unwrap_or(request.amount_minor),
            currency: intent.currency.unwrap_or(request.currency),
        })
    }

    async fn capture(&self, intent_ref: &str) -> Result<CaptureOutcome> {
        let resp = self
            .post_form(
                &format!("/payment_intents/{intent_ref}/capture"),
                &[],
                Some(format!("capture-{intent_ref}")),
                "capture payment intent",
            )
            .await?;
        let intent: StripePaymentIntent = resp.json().await?;

        Ok(CaptureOutcome {
            success: intent.status.as_deref() == Some("succeeded"),
            amount_minor: intent.amount_received.unwrap_or(0),
        })
    }

    async fn refund(
        &self,
        intent_ref: &str,
        amount_minor: i64,
        reason: &str,
    ) -> Result<RefundOutcome> {
        let body = vec![
            ("payment_intent".to_string(), intent_ref.to_string()),
            ("amount".to_string(), amount_minor.to_string()),
            ("reason".to_string(), "requested_by_customer".to_string()),
            ("metadata[reason]".to_string(), reason.to_string()),
        ];

        let resp = self
            .post_form(
                "/refunds",
                &body,
                Some(format!("refund-{intent_ref}-{amount_minor}")),
                "create refund",
            )
            .await?;

        #[derive(Deserialize)]
        struct RefundResp {
            id: String,
            amount: i64,
        }

        let parsed: RefundResp = resp.json().await?;
        Ok(RefundOutcome {
            refund_id: parsed.id,
            amount_minor: parsed.amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn client() -> StripeClient {
        StripeClient::new("sk_test".to_string(), "whsec_test".to_string())
    }

    const AUTHORIZED: &str = r#"{
        "id": "evt_1",
        "type": "payment_intent.amount_capturable_updated",
        "data": { "object": { "id": "pi_123", "status": "requires_capture" } }
    }"#;

    #[test]
    fn accepts_a_valid_signature() {
        let now = 1_800_000_000;
        let header = sign("whsec_test", now, AUTHORIZED.as_bytes());

        let event = client()
            .verify_webhook_signature(AUTHORIZED.as_bytes(), &header, now + 10)
            .unwrap();

        assert_eq!(
            StripeClient::payment_event(&event).unwrap(),
            PaymentEvent::Authorized {
                intent_ref: "pi_123".to_string()
            }
        );
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let now = 1_800_000_000;
        let header = sign("whsec_test", now, AUTHORIZED.as_bytes());
        let tampered = AUTHORIZED.replace("pi_123", "pi_999");

        assert!(
            client()
                .verify_webhook_signature(tampered.as_bytes(), &header, now)
                .is_err()
        );
    }

    #[test]
    fn rejects_a_stale_signature() {
        let now = 1_800_000_000;
        let header = sign("whsec_test", now, AUTHORIZED.as_bytes());

        assert!(
            client()
                .verify_webhook_signature(AUTHORIZED.as_bytes(), &header, now + 3600)
                .is_err()
        );
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let event = StripeEvent {
            id: None,
            type_: "customer.created".to_string(),
            created: None,
            livemode: None,
            data: StripeEventData {
                object: serde_json::json!({}),
            },
        };

        assert!(matches!(
            StripeClient::payment_event(&event).unwrap(),
            PaymentEvent::Ignored { .. }
        ));
    }
}
