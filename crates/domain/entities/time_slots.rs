use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::time_slots;

#[derive(
    Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable, Insertable,
)]
#[diesel(table_name = time_slots)]
pub struct TimeSlotEntity {
    pub id: Uuid,
    pub availability_id: Uuid,
    pub instructor_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub max_bookings: i32,
    pub current_bookings: i32,
    pub is_available: bool,
    pub is_booked: bool,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlotEntity {
    pub fn accepts_bookings(&self) -> bool {
        self.is_available && !self.is_blocked && !self.is_booked
    }

    pub fn hours_until_start(&self, now: DateTime<Utc>) -> f64 {
        (self.start_at - now).num_seconds() as f64 / 3600.0
    }
}
