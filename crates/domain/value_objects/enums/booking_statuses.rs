use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{BookingError, BookingResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Accept,
    Reject,
    Cancel,
    Expire,
    Complete,
    /// Moves an accepted request to another slot; the status stays `Accepted`.
    Reschedule,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Rejected,
        BookingStatus::Cancelled,
        BookingStatus::Expired,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(BookingStatus::Pending),
            "ACCEPTED" => Some(BookingStatus::Accepted),
            "REJECTED" => Some(BookingStatus::Rejected),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "EXPIRED" => Some(BookingStatus::Expired),
            "COMPLETED" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Transition table of the booking workflow. `None` means the event is not allowed.
    pub fn next(self, event: BookingEvent) -> Option<BookingStatus> {
        use BookingEvent as E;
        use BookingStatus::*;

        match (self, event) {
            (Pending, E::Accept) => Some(Accepted),
            (Pending, E::Reject) => Some(Rejected),
            (Pending, E::Expire) => Some(Expired),
            (Pending, E::Cancel) | (Accepted, E::Cancel) => Some(Cancelled),
            (Accepted, E::Complete) => Some(Completed),
            (Accepted, E::Reschedule) => Some(Accepted),
            _ => None,
        }
    }

    pub fn apply(self, event: BookingEvent) -> BookingResult<BookingStatus> {
        self.next(event)
            .ok_or_else(|| BookingError::invalid_transition("booking_request", self, event))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected
                | BookingStatus::Cancelled
                | BookingStatus::Expired
                | BookingStatus::Completed
        )
    }

    /// Pending and accepted requests block the consumer from opening another one for the same offering.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }
}

impl TryFrom<&str> for BookingStatus {
    type Error = BookingError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        BookingStatus::from_str(value)
            .ok_or_else(|| anyhow::anyhow!("unknown booking status in store: {value}").into())
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BookingEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEvent::Accept => "accept",
            BookingEvent::Reject => "reject",
            BookingEvent::Cancel => "cancel",
            BookingEvent::Expire => "expire",
            BookingEvent::Complete => "complete",
            BookingEvent::Reschedule => "reschedule",
        }
    }
}

impl Display for BookingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [BookingEvent; 6] = [
        BookingEvent::Accept,
        BookingEvent::Reject,
        BookingEvent::Cancel,
        BookingEvent::Expire,
        BookingEvent::Complete,
        BookingEvent::Reschedule,
    ];

    #[test]
    fn pending_can_reach_every_decision() {
        assert_eq!(
            BookingStatus::Pending.next(BookingEvent::Accept),
            Some(BookingStatus::Accepted)
        );
        assert_eq!(
            BookingStatus::Pending.next(BookingEvent::Reject),
            Some(BookingStatus::Rejected)
        );
        assert_eq!(
            BookingStatus::Pending.next(BookingEvent::Cancel),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(
            BookingStatus::Pending.next(BookingEvent::Expire),
            Some(BookingStatus::Expired)
        );
    }

    #[test]
    fn accepted_reschedules_in_place() {
        assert_eq!(
            BookingStatus::Accepted.next(BookingEvent::Reschedule),
            Some(BookingStatus::Accepted)
        );
        assert_eq!(
            BookingStatus::Accepted.next(BookingEvent::Complete),
            Some(BookingStatus::Completed)
        );
        assert_eq!(BookingStatus::Pending.next(BookingEvent::Reschedule), None);
        assert_eq!(BookingStatus::Accepted.next(BookingEvent::Expire), None);
    }

    #[test]
    fn terminal_states_reject_every_event() {
        for status in BookingStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for event in EVENTS {
                let err = status.apply(event).unwrap_err();
                assert!(
                    matches!(err, BookingError::InvalidTransition { .. }),
                    "{status} + {event} should be invalid, got {err:?}"
                );
            }
        }
    }

    #[test]
    fn stored_text_round_trips() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert!(BookingStatus::try_from("pending").is_err());
    }
}
