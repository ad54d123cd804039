use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{
        errors::{BookingError, BookingResult},
        value_objects::enums::{
            booking_modes::BookingMode, booking_statuses::BookingStatus,
            payment_statuses::PaymentStatus,
        },
    },
    infra::db::postgres::schema::booking_requests,
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
#[diesel(table_name = booking_requests, treat_none_as_null = true)]
pub struct BookingRequestEntity {
    pub id: Uuid,
    pub offering_id: Uuid,
    pub consumer_id: Uuid,
    pub instructor_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub mode: String,
    pub status: String,
    pub requested_start_at: Option<DateTime<Utc>>,
    pub requested_end_at: Option<DateTime<Utc>>,
    pub offered_price_minor: i64,
    pub final_price_minor: Option<i64>,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub reschedule_count: i32,
    pub payment_status: String,
    pub payment_intent_ref: Option<String>,
    pub refunded_amount_minor: i64,
    pub consumer_message: Option<String>,
    pub instructor_response: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingRequestEntity {
    pub fn status(&self) -> BookingResult<BookingStatus> {
        BookingStatus::try_from(self.status.as_str())
    }

    pub fn mode(&self) -> BookingResult<BookingMode> {
        BookingMode::from_str(&self.mode).ok_or_else(|| {
            BookingError::Internal(anyhow::anyhow!("unknown booking mode: {}", self.mode))
        })
    }

    pub fn payment_status(&self) -> BookingResult<PaymentStatus> {
        PaymentStatus::from_str(&self.payment_status).ok_or_else(|| {
            BookingError::Internal(anyhow::anyhow!(
                "unknown payment status: {}",
                self.payment_status
            ))
        })
    }

    /// Price the consumer pays: the instructor's counter-offer when present, otherwise the offer.
    pub fn effective_price_minor(&self) -> i64 {
        self.final_price_minor.unwrap_or(self.offered_price_minor)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.consumer_id == user_id || self.instructor_id == user_id
    }
}
