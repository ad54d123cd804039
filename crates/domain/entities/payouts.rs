use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{
        errors::{BookingError, BookingResult},
        value_objects::enums::payout_statuses::PayoutBatchStatus,
    },
    infra::db::postgres::schema::{instructor_payouts, payout_sessions},
};

#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Identifiable,
    Selectable,
    Queryable,
    Insertable,
    AsChangeset,
)]
#[diesel(table_name = instructor_payouts, treat_none_as_null = true)]
pub struct InstructorPayoutEntity {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub gross_amount_minor: i64,
    pub platform_fee_minor: i64,
    pub net_amount_minor: i64,
    pub currency: String,
    pub session_count: i32,
    pub status: String,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl InstructorPayoutEntity {
    pub fn status(&self) -> BookingResult<PayoutBatchStatus> {
        PayoutBatchStatus::from_str(&self.status).ok_or_else(|| {
            BookingError::Internal(anyhow::anyhow!("unknown payout status: {}", self.status))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Selectable, Queryable, Insertable)]
#[diesel(table_name = payout_sessions)]
pub struct PayoutSessionEntity {
    pub payout_id: Uuid,
    pub session_id: Uuid,
    pub amount_minor: i64,
}
