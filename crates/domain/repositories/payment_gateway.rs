use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use crate::domain::value_objects::payments::{
    CaptureOutcome, IntentRequest, PaymentIntentModel, RefundOutcome,
};

#[async_trait]
#[automock]
pub trait PaymentGateway {
    /// Creates a manual-capture intent; funds are captured when the session ends.
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntentModel>;
    async fn capture(&self, intent_ref: &str) -> Result<CaptureOutcome>;
    async fn refund(&self, intent_ref: &str, amount_minor: i64, reason: &str)
    -> Result<RefundOutcome>;
}
