use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Payout state carried by each live session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPayoutStatus {
    /// Session not finished or capture not attempted yet.
    #[default]
    Pending,
    /// A capture request is in flight; other capture attempts back off.
    Capturing,
    /// Payment captured; the session can join a payout batch.
    Eligible,
    Processing,
    Paid,
    /// Capture failed after completion. Retryable.
    Failed,
    /// No payment intent is attached to the session.
    NotApplicable,
}

impl SessionPayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPayoutStatus::Pending => "PENDING",
            SessionPayoutStatus::Capturing => "CAPTURING",
            SessionPayoutStatus::Eligible => "ELIGIBLE",
            SessionPayoutStatus::Processing => "PROCESSING",
            SessionPayoutStatus::Paid => "PAID",
            SessionPayoutStatus::Failed => "FAILED",
            SessionPayoutStatus::NotApplicable => "NOT_APPLICABLE",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(SessionPayoutStatus::Pending),
            "CAPTURING" => Some(SessionPayoutStatus::Capturing),
            "ELIGIBLE" => Some(SessionPayoutStatus::Eligible),
            "PROCESSING" => Some(SessionPayoutStatus::Processing),
            "PAID" => Some(SessionPayoutStatus::Paid),
            "FAILED" => Some(SessionPayoutStatus::Failed),
            "NOT_APPLICABLE" => Some(SessionPayoutStatus::NotApplicable),
            _ => None,
        }
    }
}

impl Display for SessionPayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an instructor payout batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutBatchStatus {
    #[default]
    Processing,
    Paid,
    Failed,
}

impl PayoutBatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutBatchStatus::Processing => "PROCESSING",
            PayoutBatchStatus::Paid => "PAID",
            PayoutBatchStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PROCESSING" => Some(PayoutBatchStatus::Processing),
            "PAID" => Some(PayoutBatchStatus::Paid),
            "FAILED" => Some(PayoutBatchStatus::Failed),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, PayoutBatchStatus::Processing)
    }
}

impl Display for PayoutBatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
