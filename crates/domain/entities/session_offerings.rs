use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        auto_accept::AutoAcceptOverride, cancellation_policies::CancellationPolicy,
    },
    infra::db::postgres::schema::session_offerings,
};

#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = session_offerings)]
pub struct SessionOfferingEntity {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub max_participants: i32,
    pub base_price_minor: i64,
    pub currency: String,
    pub cancellation_policy: String,
    pub auto_accept_bookings: Option<bool>,
    pub is_active: bool,
    pub is_public: bool,
    pub total_bookings: i32,
    pub total_sessions: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionOfferingEntity {
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.is_public
    }

    pub fn auto_accept(&self) -> AutoAcceptOverride {
        self.auto_accept_bookings.into()
    }

    pub fn cancellation_policy(&self) -> CancellationPolicy {
        CancellationPolicy::from_str(&self.cancellation_policy)
    }
}
