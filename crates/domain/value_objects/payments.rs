use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One payment attempt for a booking.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentRequest {
    pub booking_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    /// Intent left behind by an earlier failed attempt.
    pub previous_intent_ref: Option<String>,
}

impl IntentRequest {
    /// Stable for duplicate submissions of the same attempt. A new amount or a retry
    /// after a failed intent yields a new key.
    pub fn idempotency_key(&self) -> String {
        match &self.previous_intent_ref {
            Some(previous) => format!(
                "booking-intent-{}-{}-after-{previous}",
                self.booking_id, self.amount_minor
            ),
            None => format!("booking-intent-{}-{}", self.booking_id, self.amount_minor),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntentModel {
    pub intent_ref: String,
    pub client_secret: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureOutcome {
    pub success: bool,
    pub amount_minor: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundOutcome {
    pub refund_id: String,
    pub amount_minor: i64,
}

/// Payment intent events the engine reacts to, decoded from the gateway webhook.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    Authorized { intent_ref: String },
    Failed { intent_ref: String, reason: Option<String> },
    Ignored { event_type: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEventOutcome {
    pub booking_id: Option<Uuid>,
    pub handled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount_minor: i64, previous: Option<&str>) -> IntentRequest {
        IntentRequest {
            booking_id: Uuid::nil(),
            amount_minor,
            currency: "USD".to_string(),
            previous_intent_ref: previous.map(str::to_string),
        }
    }

    #[test]
    fn duplicate_attempts_share_a_key() {
        assert_eq!(
            request(10_000, None).idempotency_key(),
            request(10_000, None).idempotency_key()
        );
    }

    #[test]
    fn retries_and_price_changes_get_fresh_keys() {
        let first = request(10_000, None).idempotency_key();

        assert_ne!(first, request(10_000, Some("pi_failed")).idempotency_key());
        assert_ne!(first, request(12_500, None).idempotency_key());
        assert_ne!(
            request(10_000, Some("pi_a")).idempotency_key(),
            request(10_000, Some("pi_b")).idempotency_key()
        );
    }
}
