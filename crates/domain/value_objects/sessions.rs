use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{
        attendance_records::AttendanceRecordEntity, live_sessions::LiveSessionEntity,
        session_participants::SessionParticipantEntity,
    },
    errors::{BookingError, BookingResult},
    value_objects::enums::{
        cancellation_policies::CancellationPolicy, session_statuses::SessionStatus,
        sort_order::SortOrder,
    },
};

/// Instructor-run session created without a booking request, e.g. a group class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionModel {
    #[serde(default)]
    pub offering_id: Option<Uuid>,
    #[serde(default)]
    pub slot_id: Option<Uuid>,
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Ignored when a slot is given.
    #[serde(default)]
    pub scheduled_start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub price_per_person_minor: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub cancellation_policy: Option<CancellationPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateSessionModel {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_per_person_minor: Option<i64>,
    pub max_participants: Option<i32>,
}

impl UpdateSessionModel {
    pub fn validate(&self) -> BookingResult<()> {
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(BookingError::BadRequest("title must not be empty".to_string()));
        }
        if matches!(self.price_per_person_minor, Some(price) if price < 0) {
            return Err(BookingError::BadRequest(
                "price_per_person_minor must not be negative".to_string(),
            ));
        }
        if matches!(self.max_participants, Some(max) if max <= 0) {
            return Err(BookingError::BadRequest(
                "max_participants must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RescheduleSessionModel {
    pub new_start_at: Option<DateTime<Utc>>,
    pub new_slot_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CancelSessionModel {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceAction {
    Join,
    Leave,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionListFilter {
    pub instructor_id: Option<Uuid>,
    /// Sessions the user is enrolled in.
    pub participant_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRoomModel {
    pub room_ref: String,
    pub join_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionDetailsModel {
    pub session: LiveSessionEntity,
    pub participants: Vec<SessionParticipantEntity>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttendanceModel {
    pub participant: SessionParticipantEntity,
    pub record: AttendanceRecordEntity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionStatsModel {
    pub total: i64,
    pub scheduled: i64,
    pub confirmed: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total_revenue_minor: i64,
    pub instructor_earnings_minor: i64,
    pub total_participants: i64,
    pub average_actual_duration_minutes: Option<f64>,
}

impl SessionStatsModel {
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a LiveSessionEntity>) -> Self {
        let mut stats = SessionStatsModel::default();
        let mut duration_sum = 0i64;
        let mut duration_count = 0i64;

        for session in sessions {
            stats.total += 1;
            stats.total_participants += i64::from(session.current_participants);
            match SessionStatus::from_str(&session.status) {
                Some(SessionStatus::Scheduled | SessionStatus::Rescheduled) => {
                    stats.scheduled += 1
                }
                Some(SessionStatus::Confirmed) => stats.confirmed += 1,
                Some(SessionStatus::InProgress) => stats.in_progress += 1,
                Some(SessionStatus::Completed) => {
                    stats.completed += 1;
                    stats.total_revenue_minor += session.total_revenue_minor;
                    stats.instructor_earnings_minor += session.instructor_earnings_minor();
                    if let Some(minutes) = session.actual_duration_minutes {
                        duration_sum += i64::from(minutes);
                        duration_count += 1;
                    }
                }
                Some(SessionStatus::Cancelled) => stats.cancelled += 1,
                None => {}
            }
        }

        if duration_count > 0 {
            stats.average_actual_duration_minutes =
                Some(duration_sum as f64 / duration_count as f64);
        }

        stats
    }
}
