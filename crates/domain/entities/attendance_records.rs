use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::attendance_records;

/// One join/leave interval of a participant.
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
#[diesel(table_name = attendance_records, treat_none_as_null = true)]
pub struct AttendanceRecordEntity {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub minutes_attended: Option<i32>,
}

impl AttendanceRecordEntity {
    pub fn close(&mut self, left_at: DateTime<Utc>) -> i32 {
        let minutes = (left_at - self.joined_at).num_minutes().max(0) as i32;
        self.left_at = Some(left_at);
        self.minutes_attended = Some(minutes);
        minutes
    }
}
