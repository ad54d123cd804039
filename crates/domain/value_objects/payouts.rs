use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::payouts::{InstructorPayoutEntity, PayoutSessionEntity},
    value_objects::enums::{payout_statuses::PayoutBatchStatus, sort_order::SortOrder},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutSettlementModel {
    pub status: PayoutBatchStatus,
    #[serde(default)]
    pub provider_reference: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PayoutListFilter {
    pub instructor_id: Option<Uuid>,
    pub status: Option<PayoutBatchStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayoutDetailsModel {
    pub payout: InstructorPayoutEntity,
    pub sessions: Vec<PayoutSessionEntity>,
}

/// Outcome of one payout batching run over all instructors.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutRunReport {
    pub instructors: usize,
    pub created: usize,
    pub failed: usize,
}
