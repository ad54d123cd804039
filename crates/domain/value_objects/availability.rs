use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{availabilities::AvailabilityEntity, time_slots::TimeSlotEntity},
    errors::{BookingError, BookingResult},
    value_objects::{enums::auto_accept::AutoAcceptOverride, settings::MAX_GENERATION_RANGE_DAYS},
};

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_max_advance_hours() -> i32 {
    720
}

fn default_max_sessions_per_slot() -> i32 {
    1
}

/// Bookable window settings shared by single-day creation and range generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindowModel {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    #[serde(default)]
    pub buffer_minutes: i32,
    #[serde(default)]
    pub min_advance_hours: i32,
    #[serde(default = "default_max_advance_hours")]
    pub max_advance_hours: i32,
    #[serde(default = "default_max_sessions_per_slot")]
    pub max_sessions_per_slot: i32,
    #[serde(default)]
    pub auto_accept_bookings: AutoAcceptOverride,
    #[serde(default)]
    pub price_override_minor: Option<i64>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl AvailabilityWindowModel {
    pub fn validate(&self) -> BookingResult<()> {
        if self.start_time >= self.end_time {
            return Err(BookingError::BadRequest(
                "start_time must be before end_time".to_string(),
            ));
        }
        if self.slot_duration_minutes <= 0 {
            return Err(BookingError::BadRequest(
                "slot_duration_minutes must be positive".to_string(),
            ));
        }
        if self.buffer_minutes < 0 {
            return Err(BookingError::BadRequest(
                "buffer_minutes must not be negative".to_string(),
            ));
        }
        if self.min_advance_hours < 0 || self.max_advance_hours < self.min_advance_hours {
            return Err(BookingError::BadRequest(
                "advance window must satisfy 0 <= min_advance_hours <= max_advance_hours"
                    .to_string(),
            ));
        }
        if self.max_sessions_per_slot <= 0 {
            return Err(BookingError::BadRequest(
                "max_sessions_per_slot must be positive".to_string(),
            ));
        }
        if matches!(self.price_override_minor, Some(price) if price < 0) {
            return Err(BookingError::BadRequest(
                "price_override_minor must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_entity(
        &self,
        instructor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> AvailabilityEntity {
        AvailabilityEntity {
            id: Uuid::new_v4(),
            instructor_id,
            date,
            start_time: self.start_time,
            end_time: self.end_time,
            slot_duration_minutes: self.slot_duration_minutes,
            buffer_minutes: self.buffer_minutes,
            min_advance_hours: self.min_advance_hours,
            max_advance_hours: self.max_advance_hours,
            max_sessions_per_slot: self.max_sessions_per_slot,
            auto_accept_bookings: self.auto_accept_bookings.into(),
            price_override_minor: self.price_override_minor,
            timezone: self.timezone.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<&AvailabilityEntity> for AvailabilityWindowModel {
    fn from(availability: &AvailabilityEntity) -> Self {
        Self {
            start_time: availability.start_time,
            end_time: availability.end_time,
            slot_duration_minutes: availability.slot_duration_minutes,
            buffer_minutes: availability.buffer_minutes,
            min_advance_hours: availability.min_advance_hours,
            max_advance_hours: availability.max_advance_hours,
            max_sessions_per_slot: availability.max_sessions_per_slot,
            auto_accept_bookings: availability.auto_accept(),
            price_override_minor: availability.price_override_minor,
            timezone: availability.timezone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateAvailabilityModel {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub window: AvailabilityWindowModel,
}

/// Partial edit of a window. Any change to the slot geometry regenerates the slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateAvailabilityModel {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    pub buffer_minutes: Option<i32>,
    pub min_advance_hours: Option<i32>,
    pub max_advance_hours: Option<i32>,
    pub max_sessions_per_slot: Option<i32>,
    pub auto_accept_bookings: Option<AutoAcceptOverride>,
    /// `Some(None)` clears the override.
    #[serde(default, with = "double_option")]
    pub price_override_minor: Option<Option<i64>>,
    pub timezone: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateAvailabilityModel {
    /// Applies the edit and reports whether the slot boundaries or capacity changed.
    pub fn apply_to(&self, availability: &mut AvailabilityEntity) -> bool {
        let before = availability.clone();

        if let Some(date) = self.date {
            availability.date = date;
        }
        if let Some(start_time) = self.start_time {
            availability.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            availability.end_time = end_time;
        }
        if let Some(duration) = self.slot_duration_minutes {
            availability.slot_duration_minutes = duration;
        }
        if let Some(buffer) = self.buffer_minutes {
            availability.buffer_minutes = buffer;
        }
        if let Some(min) = self.min_advance_hours {
            availability.min_advance_hours = min;
        }
        if let Some(max) = self.max_advance_hours {
            availability.max_advance_hours = max;
        }
        if let Some(capacity) = self.max_sessions_per_slot {
            availability.max_sessions_per_slot = capacity;
        }
        if let Some(auto_accept) = self.auto_accept_bookings {
            availability.auto_accept_bookings = auto_accept.into();
        }
        if let Some(price) = self.price_override_minor {
            availability.price_override_minor = price;
        }
        if let Some(timezone) = &self.timezone {
            availability.timezone = timezone.clone();
        }
        if let Some(is_active) = self.is_active {
            availability.is_active = is_active;
        }

        before.date != availability.date
            || before.start_time != availability.start_time
            || before.end_time != availability.end_time
            || before.slot_duration_minutes != availability.slot_duration_minutes
            || before.buffer_minutes != availability.buffer_minutes
            || before.max_sessions_per_slot != availability.max_sessions_per_slot
            || before.timezone != availability.timezone
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: serde::Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Creates one window per matching weekday between `from` and `to` inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateAvailabilityRangeModel {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// ISO weekday numbers, Monday = 1. Empty means every day.
    #[serde(default)]
    pub weekdays: Vec<u32>,
    #[serde(flatten)]
    pub window: AvailabilityWindowModel,
}

impl GenerateAvailabilityRangeModel {
    pub fn dates(&self) -> BookingResult<Vec<NaiveDate>> {
        if self.to < self.from {
            return Err(BookingError::BadRequest(
                "range end must not precede range start".to_string(),
            ));
        }
        if (self.to - self.from).num_days() >= MAX_GENERATION_RANGE_DAYS {
            return Err(BookingError::PolicyViolation(format!(
                "availability ranges are limited to {MAX_GENERATION_RANGE_DAYS} days"
            )));
        }
        if let Some(day) = self.weekdays.iter().find(|day| !(1..=7).contains(*day)) {
            return Err(BookingError::BadRequest(format!("invalid weekday: {day}")));
        }

        Ok(self
            .from
            .iter_days()
            .take_while(|date| *date <= self.to)
            .filter(|date| {
                use chrono::Datelike;
                self.weekdays.is_empty()
                    || self.weekdays.contains(&date.weekday().number_from_monday())
            })
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotRangeQuery {
    pub instructor_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub only_bookable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictCheckModel {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub exclude_session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub session_ids: Vec<Uuid>,
    pub blocked_slot_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailabilityWithSlotsModel {
    pub availability: AvailabilityEntity,
    pub slots: Vec<TimeSlotEntity>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedRangeModel {
    pub created: Vec<AvailabilityWithSlotsModel>,
    /// Dates skipped because a window already overlaps them.
    pub skipped_dates: Vec<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> AvailabilityWindowModel {
        AvailabilityWindowModel {
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            slot_duration_minutes: 60,
            buffer_minutes: 0,
            min_advance_hours: 0,
            max_advance_hours: 720,
            max_sessions_per_slot: 1,
            auto_accept_bookings: AutoAcceptOverride::Unset,
            price_override_minor: None,
            timezone: "UTC".to_string(),
        }
    }

    #[test]
    fn range_filters_weekdays() {
        let model = GenerateAvailabilityRangeModel {
            // 2026-11-02 is a Monday.
            from: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 11, 15).unwrap(),
            weekdays: vec![1, 3],
            window: window(),
        };

        let dates = model.dates().unwrap();
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2026, 11, 4).unwrap());
    }

    #[test]
    fn range_longer_than_limit_is_a_policy_violation() {
        let model = GenerateAvailabilityRangeModel {
            from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            weekdays: vec![],
            window: window(),
        };

        assert!(matches!(
            model.dates(),
            Err(BookingError::PolicyViolation(_))
        ));
    }

    #[test]
    fn window_rejects_inverted_times() {
        let mut model = window();
        model.end_time = model.start_time;
        assert!(matches!(model.validate(), Err(BookingError::BadRequest(_))));
    }

    #[test]
    fn update_reports_geometry_changes_only() {
        let now = Utc::now();
        let mut availability =
            window().to_entity(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(), now);

        let pricing_only = UpdateAvailabilityModel {
            price_override_minor: Some(Some(2500)),
            ..Default::default()
        };
        assert!(!pricing_only.apply_to(&mut availability));
        assert_eq!(availability.price_override_minor, Some(2500));

        let longer_slots = UpdateAvailabilityModel {
            slot_duration_minutes: Some(90),
            ..Default::default()
        };
        assert!(longer_slots.apply_to(&mut availability));
    }
}
