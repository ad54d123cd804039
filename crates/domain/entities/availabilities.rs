use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::auto_accept::AutoAcceptOverride,
    infra::db::postgres::schema::instructor_availabilities,
};

#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = instructor_availabilities, treat_none_as_null = true)]
pub struct AvailabilityEntity {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub buffer_minutes: i32,
    pub min_advance_hours: i32,
    pub max_advance_hours: i32,
    pub max_sessions_per_slot: i32,
    pub auto_accept_bookings: Option<bool>,
    pub price_override_minor: Option<i64>,
    pub timezone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityEntity {
    pub fn auto_accept(&self) -> AutoAcceptOverride {
        self.auto_accept_bookings.into()
    }

    /// Two windows of the same instructor on the same date overlap when their half-open ranges intersect.
    pub fn overlaps(&self, date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> bool {
        self.date == date && start_time < self.end_time && end_time > self.start_time
    }
}
