use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::instructor_profiles;

/// Read-only view of the instructor settings the booking engine consults.
#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = instructor_profiles, primary_key(user_id))]
pub struct InstructorProfileEntity {
    pub user_id: Uuid,
    pub auto_accept_bookings: bool,
    pub accepting_students: bool,
    pub live_sessions_enabled: bool,
    pub default_cancellation_policy: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstructorProfileEntity {
    pub fn is_accepting_bookings(&self) -> bool {
        self.accepting_students && self.live_sessions_enabled
    }
}
