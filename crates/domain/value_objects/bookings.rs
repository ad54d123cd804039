use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{booking_requests::BookingRequestEntity, live_sessions::LiveSessionEntity},
    value_objects::enums::{
        booking_modes::BookingMode, booking_statuses::BookingStatus,
        cancellation_policies::CancellationPolicy, sort_order::SortOrder,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateBookingModel {
    pub offering_id: Uuid,
    #[serde(default)]
    pub slot_id: Option<Uuid>,
    #[serde(default)]
    pub mode: BookingMode,
    /// Proposed start for `REQUEST` bookings without a slot.
    #[serde(default)]
    pub requested_start_at: Option<DateTime<Utc>>,
    /// Defaults to the slot price override or the offering base price.
    #[serde(default)]
    pub offered_price_minor: Option<i64>,
    #[serde(default)]
    pub consumer_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AcceptBookingModel {
    pub final_price_minor: Option<i64>,
    pub slot_id: Option<Uuid>,
    pub instructor_response: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RejectBookingModel {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CancelBookingModel {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleBookingModel {
    pub new_slot_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Which side of the booking the caller lists from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingRole {
    #[default]
    Consumer,
    Instructor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingListFilter {
    pub instructor_id: Option<Uuid>,
    pub consumer_id: Option<Uuid>,
    pub offering_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl BookingListFilter {
    pub fn matches(&self, booking: &BookingRequestEntity) -> bool {
        self.instructor_id.is_none_or(|id| booking.instructor_id == id)
            && self.consumer_id.is_none_or(|id| booking.consumer_id == id)
            && self.offering_id.is_none_or(|id| booking.offering_id == id)
            && self
                .status
                .is_none_or(|status| booking.status == status.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingDetailsModel {
    pub booking: BookingRequestEntity,
    pub session: Option<LiveSessionEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingStatsModel {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub cancelled: i64,
    pub expired: i64,
    pub completed: i64,
    /// Share of decided requests that were accepted, in percent.
    pub acceptance_rate: f64,
    pub accepted_revenue_minor: i64,
    pub completed_revenue_minor: i64,
}

impl BookingStatsModel {
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a BookingRequestEntity>) -> Self {
        let mut stats = BookingStatsModel::default();

        for booking in bookings {
            stats.total += 1;
            match BookingStatus::from_str(&booking.status) {
                Some(BookingStatus::Pending) => stats.pending += 1,
                Some(BookingStatus::Accepted) => {
                    stats.accepted += 1;
                    stats.accepted_revenue_minor += booking.effective_price_minor();
                }
                Some(BookingStatus::Rejected) => stats.rejected += 1,
                Some(BookingStatus::Cancelled) => stats.cancelled += 1,
                Some(BookingStatus::Expired) => stats.expired += 1,
                Some(BookingStatus::Completed) => {
                    stats.completed += 1;
                    stats.completed_revenue_minor += booking.effective_price_minor();
                }
                None => {}
            }
        }

        // Completed bookings were accepted first.
        let accepted_ever = stats.accepted + stats.completed;
        let decided = accepted_ever + stats.rejected + stats.expired;
        if decided > 0 {
            stats.acceptance_rate = accepted_ever as f64 * 100.0 / decided as f64;
        }

        stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundQuoteModel {
    pub booking_id: Uuid,
    pub policy: CancellationPolicy,
    pub hours_until_start: f64,
    pub original_amount_minor: i64,
    pub refund_percent: i64,
    pub refund_amount_minor: i64,
}

/// Outcome of one expiry sweep batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpirySweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub failed: usize,
}
