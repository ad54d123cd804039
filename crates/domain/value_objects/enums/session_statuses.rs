use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{BookingError, BookingResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    /// Transient: a rescheduled session re-enters `Scheduled` or `Confirmed` in the same transaction.
    Rescheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Confirm,
    Unconfirm,
    Start,
    End,
    Cancel,
    Reschedule,
    Resume(SessionStatus),
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 6] = [
        SessionStatus::Scheduled,
        SessionStatus::Confirmed,
        SessionStatus::InProgress,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
        SessionStatus::Rescheduled,
    ];

    /// Statuses that occupy the instructor's calendar.
    pub const ACTIVE: [SessionStatus; 3] = [
        SessionStatus::Scheduled,
        SessionStatus::Confirmed,
        SessionStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "SCHEDULED",
            SessionStatus::Confirmed => "CONFIRMED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
            SessionStatus::Rescheduled => "RESCHEDULED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(SessionStatus::Scheduled),
            "CONFIRMED" => Some(SessionStatus::Confirmed),
            "IN_PROGRESS" => Some(SessionStatus::InProgress),
            "COMPLETED" => Some(SessionStatus::Completed),
            "CANCELLED" => Some(SessionStatus::Cancelled),
            "RESCHEDULED" => Some(SessionStatus::Rescheduled),
            _ => None,
        }
    }

    /// Transition table of the session lifecycle.
    pub fn next(self, event: SessionEvent) -> Option<SessionStatus> {
        use SessionEvent as E;
        use SessionStatus::*;

        match (self, event) {
            (Scheduled, E::Confirm) => Some(Confirmed),
            (Confirmed, E::Unconfirm) => Some(Scheduled),
            (Scheduled | Confirmed, E::Start) => Some(InProgress),
            (Scheduled | InProgress, E::End) => Some(Completed),
            (Scheduled | Confirmed | InProgress | Rescheduled, E::Cancel) => Some(Cancelled),
            (Scheduled | Confirmed, E::Reschedule) => Some(Rescheduled),
            (Rescheduled, E::Resume(target @ (Scheduled | Confirmed))) => Some(target),
            _ => None,
        }
    }

    pub fn apply(self, event: SessionEvent) -> BookingResult<SessionStatus> {
        self.next(event)
            .ok_or_else(|| BookingError::invalid_transition("live_session", self, event))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        SessionStatus::ACTIVE.contains(self)
    }
}

impl TryFrom<&str> for SessionStatus {
    type Error = BookingError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        SessionStatus::from_str(value)
            .ok_or_else(|| anyhow::anyhow!("unknown session status in store: {value}").into())
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Confirm => f.write_str("confirm"),
            SessionEvent::Unconfirm => f.write_str("unconfirm"),
            SessionEvent::Start => f.write_str("start"),
            SessionEvent::End => f.write_str("end"),
            SessionEvent::Cancel => f.write_str("cancel"),
            SessionEvent::Reschedule => f.write_str("reschedule"),
            SessionEvent::Resume(target) => write!(f, "resume({target})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStatus::*;

    fn events() -> Vec<SessionEvent> {
        let mut events = vec![
            SessionEvent::Confirm,
            SessionEvent::Unconfirm,
            SessionEvent::Start,
            SessionEvent::End,
            SessionEvent::Cancel,
            SessionEvent::Reschedule,
        ];
        events.extend(SessionStatus::ALL.iter().map(|s| SessionEvent::Resume(*s)));
        events
    }

    #[test]
    fn scheduled_and_confirmed_toggle() {
        assert_eq!(Scheduled.next(SessionEvent::Confirm), Some(Confirmed));
        assert_eq!(Confirmed.next(SessionEvent::Unconfirm), Some(Scheduled));
        assert_eq!(Confirmed.next(SessionEvent::Confirm), None);
    }

    #[test]
    fn end_requires_scheduled_or_in_progress() {
        assert_eq!(Scheduled.next(SessionEvent::End), Some(Completed));
        assert_eq!(InProgress.next(SessionEvent::End), Some(Completed));
        assert_eq!(Confirmed.next(SessionEvent::End), None);
    }

    #[test]
    fn reschedule_reenters_scheduled_or_confirmed_only() {
        assert_eq!(Confirmed.next(SessionEvent::Reschedule), Some(Rescheduled));
        assert_eq!(
            Rescheduled.next(SessionEvent::Resume(Confirmed)),
            Some(Confirmed)
        );
        assert_eq!(Rescheduled.next(SessionEvent::Resume(InProgress)), None);
        assert_eq!(InProgress.next(SessionEvent::Reschedule), None);
    }

    #[test]
    fn terminal_states_are_closed() {
        for status in [Completed, Cancelled] {
            for event in events() {
                assert!(
                    matches!(
                        status.apply(event),
                        Err(BookingError::InvalidTransition { .. })
                    ),
                    "{status} + {event} should be rejected"
                );
            }
        }
    }

    #[test]
    fn every_non_terminal_state_can_cancel() {
        for status in SessionStatus::ALL.iter().filter(|s| !s.is_terminal()) {
            assert_eq!(status.next(SessionEvent::Cancel), Some(Cancelled));
        }
    }
}
