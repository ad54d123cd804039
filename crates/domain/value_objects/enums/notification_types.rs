use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    BookingRequested,
    BookingAccepted,
    BookingRejected,
    BookingCancelled,
    BookingExpired,
    BookingRescheduled,
    SessionScheduled,
    SessionStarted,
    SessionCompleted,
    SessionCancelled,
    SessionRescheduled,
    RefundIssued,
    PayoutCreated,
    PayoutSettled,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::BookingRequested => "BOOKING_REQUESTED",
            NotificationType::BookingAccepted => "BOOKING_ACCEPTED",
            NotificationType::BookingRejected => "BOOKING_REJECTED",
            NotificationType::BookingCancelled => "BOOKING_CANCELLED",
            NotificationType::BookingExpired => "BOOKING_EXPIRED",
            NotificationType::BookingRescheduled => "BOOKING_RESCHEDULED",
            NotificationType::SessionScheduled => "SESSION_SCHEDULED",
            NotificationType::SessionStarted => "SESSION_STARTED",
            NotificationType::SessionCompleted => "SESSION_COMPLETED",
            NotificationType::SessionCancelled => "SESSION_CANCELLED",
            NotificationType::SessionRescheduled => "SESSION_RESCHEDULED",
            NotificationType::RefundIssued => "REFUND_ISSUED",
            NotificationType::PayoutCreated => "PAYOUT_CREATED",
            NotificationType::PayoutSettled => "PAYOUT_SETTLED",
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
