use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{
        errors::{BookingError, BookingResult},
        value_objects::enums::{
            cancellation_policies::CancellationPolicy, payout_statuses::SessionPayoutStatus,
            session_statuses::SessionStatus,
        },
    },
    infra::db::postgres::schema::live_sessions,
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
#[diesel(table_name = live_sessions, treat_none_as_null = true)]
pub struct LiveSessionEntity {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub offering_id: Option<Uuid>,
    pub booking_request_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_start_at: DateTime<Utc>,
    pub scheduled_end_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub actual_start_at: Option<DateTime<Utc>>,
    pub actual_end_at: Option<DateTime<Utc>>,
    pub actual_duration_minutes: Option<i32>,
    pub status: String,
    pub max_participants: i32,
    pub current_participants: i32,
    pub price_per_person_minor: i64,
    pub platform_fee_minor: i64,
    pub instructor_payout_minor: i64,
    pub total_revenue_minor: i64,
    pub currency: String,
    pub cancellation_policy: String,
    pub payment_intent_ref: Option<String>,
    pub payout_status: String,
    pub meeting_room_id: Option<String>,
    pub meeting_join_url: Option<String>,
    pub recording_url: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LiveSessionEntity {
    pub fn status(&self) -> BookingResult<SessionStatus> {
        SessionStatus::try_from(self.status.as_str())
    }

    pub fn payout_status(&self) -> BookingResult<SessionPayoutStatus> {
        SessionPayoutStatus::from_str(&self.payout_status).ok_or_else(|| {
            BookingError::Internal(anyhow::anyhow!(
                "unknown payout status: {}",
                self.payout_status
            ))
        })
    }

    pub fn cancellation_policy(&self) -> CancellationPolicy {
        CancellationPolicy::from_str(&self.cancellation_policy)
    }

    /// Half-open interval overlap against another calendar window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.scheduled_end_at && end > self.scheduled_start_at
    }

    /// Platform fees collected over all participants; the snapshot fields are per person.
    pub fn platform_fees_minor(&self) -> i64 {
        self.platform_fee_minor * i64::from(self.current_participants)
    }

    pub fn instructor_earnings_minor(&self) -> i64 {
        self.total_revenue_minor - self.platform_fees_minor()
    }

    pub fn has_free_seat(&self) -> bool {
        self.current_participants < self.max_participants
    }
}
