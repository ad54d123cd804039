use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::domain::{
    entities::{availabilities::AvailabilityEntity, time_slots::TimeSlotEntity},
    errors::{BookingError, BookingResult},
};

/// Boundaries of one generated slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBounds {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotWindow<'a> {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub buffer_minutes: i32,
    pub timezone: &'a str,
}

impl<'a> From<&'a AvailabilityEntity> for SlotWindow<'a> {
    fn from(availability: &'a AvailabilityEntity) -> Self {
        Self {
            date: availability.date,
            start_time: availability.start_time,
            end_time: availability.end_time,
            slot_duration_minutes: availability.slot_duration_minutes,
            buffer_minutes: availability.buffer_minutes,
            timezone: &availability.timezone,
        }
    }
}

pub fn parse_timezone(name: &str) -> BookingResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| BookingError::BadRequest(format!("unknown timezone: {name}")))
}

/// Resolves a wall-clock time. A DST fold picks the earlier instant, a DST gap is rejected.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime) -> BookingResult<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(BookingError::BadRequest(format!(
            "{local} does not exist in {tz}"
        ))),
    }
}

/// Tiles `[start, end)` with slots of `duration`, separated by `buffer`.
///
/// The walk happens on the local wall clock. A trailing slot that would cross `end` is
/// dropped.
pub fn generate_slots(window: &SlotWindow<'_>) -> BookingResult<Vec<SlotBounds>> {
    if window.slot_duration_minutes <= 0 {
        return Err(BookingError::BadRequest(
            "slot duration must be positive".to_string(),
        ));
    }
    if window.buffer_minutes < 0 {
        return Err(BookingError::BadRequest(
            "buffer must not be negative".to_string(),
        ));
    }
    if window.start_time >= window.end_time {
        return Err(BookingError::BadRequest(
            "window start must be before its end".to_string(),
        ));
    }

    let tz = parse_timezone(window.timezone)?;
    let duration = Duration::minutes(i64::from(window.slot_duration_minutes));
    let step = duration + Duration::minutes(i64::from(window.buffer_minutes));
    let end = window.date.and_time(window.end_time);

    let mut slots = Vec::new();
    let mut cursor = window.date.and_time(window.start_time);
    while cursor + duration <= end {
        slots.push(SlotBounds {
            start_at: resolve_local(&tz, cursor)?,
            end_at: resolve_local(&tz, cursor + duration)?,
        });
        cursor += step;
    }

    Ok(slots)
}

/// Materializes the slot rows of an availability with fresh ids and empty counters.
pub fn slots_for_availability(
    availability: &AvailabilityEntity,
    now: DateTime<Utc>,
) -> BookingResult<Vec<TimeSlotEntity>> {
    let bounds = generate_slots(&SlotWindow::from(availability))?;

    Ok(bounds
        .into_iter()
        .map(|slot| TimeSlotEntity {
            id: Uuid::new_v4(),
            availability_id: availability.id,
            instructor_id: availability.instructor_id,
            start_at: slot.start_at,
            end_at: slot.end_at,
            duration_minutes: availability.slot_duration_minutes,
            max_bookings: availability.max_sessions_per_slot,
            current_bookings: 0,
            is_available: availability.is_active,
            is_booked: false,
            is_blocked: false,
            created_at: now,
            updated_at: now,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn utc(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(time(hour, minute)))
    }

    fn window(start: NaiveTime, end: NaiveTime, duration: i32, buffer: i32) -> SlotWindow<'static> {
        SlotWindow {
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start_time: start,
            end_time: end,
            slot_duration_minutes: duration,
            buffer_minutes: buffer,
            timezone: "UTC",
        }
    }

    #[test]
    fn one_hour_window_yields_two_half_hour_slots() {
        let window = window(time(9, 0), time(10, 0), 30, 0);
        let slots = generate_slots(&window).unwrap();

        assert_eq!(
            slots,
            vec![
                SlotBounds {
                    start_at: utc(window.date, 9, 0),
                    end_at: utc(window.date, 9, 30),
                },
                SlotBounds {
                    start_at: utc(window.date, 9, 30),
                    end_at: utc(window.date, 10, 0),
                },
            ]
        );
    }

    #[test]
    fn partial_trailing_slot_is_dropped() {
        let window = window(time(9, 0), time(10, 40), 30, 10);
        let slots = generate_slots(&window).unwrap();

        // 09:00, 09:40 fit; 10:20-10:50 would cross the end.
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].start_at, utc(window.date, 9, 40));
        assert_eq!(slots[1].end_at, utc(window.date, 10, 10));
    }

    #[test]
    fn slots_never_overlap_and_start_in_order() {
        let window = window(time(8, 0), time(18, 0), 45, 15);
        let slots = generate_slots(&window).unwrap();

        assert!(!slots.is_empty());
        for pair in slots.windows(2) {
            assert!(pair[0].start_at < pair[1].start_at);
            assert!(pair[0].end_at <= pair[1].start_at);
        }
        assert!(slots.last().unwrap().end_at <= utc(window.date, 18, 0));
    }

    #[test]
    fn regeneration_reproduces_boundaries() {
        let window = window(time(9, 0), time(17, 0), 50, 10);
        assert_eq!(
            generate_slots(&window).unwrap(),
            generate_slots(&window).unwrap()
        );
    }

    #[test]
    fn window_shorter_than_one_slot_is_empty() {
        let window = window(time(9, 0), time(9, 20), 30, 0);
        assert!(generate_slots(&window).unwrap().is_empty());
    }

    #[test]
    fn local_times_follow_the_timezone() {
        let mut window = window(time(9, 0), time(10, 0), 60, 0);
        window.timezone = "Asia/Bangkok";
        let slots = generate_slots(&window).unwrap();

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_at, utc(window.date, 2, 0));
    }

    #[test]
    fn dst_gap_is_rejected() {
        // Clocks in New York jump from 02:00 to 03:00 on 2026-03-08.
        let window = SlotWindow {
            date: NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            start_time: time(1, 30),
            end_time: time(3, 30),
            slot_duration_minutes: 30,
            buffer_minutes: 0,
            timezone: "America/New_York",
        };

        assert!(matches!(
            generate_slots(&window),
            Err(BookingError::BadRequest(_))
        ));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let mut window = window(time(9, 0), time(10, 0), 30, 0);
        window.timezone = "Mars/Olympus";
        assert!(matches!(
            generate_slots(&window),
            Err(BookingError::BadRequest(_))
        ));
    }
}
