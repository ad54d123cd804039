use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{
        errors::{BookingError, BookingResult},
        value_objects::enums::participant_statuses::ParticipantStatus,
    },
    infra::db::postgres::schema::session_participants,
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
#[diesel(table_name = session_participants, treat_none_as_null = true)]
pub struct SessionParticipantEntity {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
    pub total_minutes: i32,
}

impl SessionParticipantEntity {
    pub fn status(&self) -> BookingResult<ParticipantStatus> {
        ParticipantStatus::from_str(&self.status).ok_or_else(|| {
            BookingError::Internal(anyhow::anyhow!(
                "unknown participant status: {}",
                self.status
            ))
        })
    }
}
