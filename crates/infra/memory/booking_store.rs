use anyhow::{Result, anyhow, bail, ensure};
use chrono::{DateTime, NaiveDate, Utc};
use std::{collections::HashMap, sync::Mutex};
use uuid::Uuid;

use crate::domain::{
    entities::{
        app_users::AppUserEntity, attendance_records::AttendanceRecordEntity,
        availabilities::AvailabilityEntity, booking_requests::BookingRequestEntity,
        instructor_profiles::InstructorProfileEntity, live_sessions::LiveSessionEntity,
        payouts::{InstructorPayoutEntity, PayoutSessionEntity},
        session_offerings::SessionOfferingEntity,
        session_participants::SessionParticipantEntity, time_slots::TimeSlotEntity,
    },
    errors::{BookingError, BookingResult},
    repositories::booking_store::{BookingStore, StoreTx},
    value_objects::{
        bookings::BookingListFilter,
        enums::{
            booking_statuses::BookingStatus, participant_statuses::ParticipantStatus,
            payout_statuses::SessionPayoutStatus, session_statuses::SessionStatus,
            sort_order::SortOrder,
        },
        payouts::PayoutListFilter,
        sessions::SessionListFilter,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, AppUserEntity>,
    profiles: HashMap<Uuid, InstructorProfileEntity>,
    offerings: HashMap<Uuid, SessionOfferingEntity>,
    availabilities: HashMap<Uuid, AvailabilityEntity>,
    slots: HashMap<Uuid, TimeSlotEntity>,
    bookings: HashMap<Uuid, BookingRequestEntity>,
    sessions: HashMap<Uuid, LiveSessionEntity>,
    participants: HashMap<Uuid, SessionParticipantEntity>,
    attendance: HashMap<Uuid, AttendanceRecordEntity>,
    payouts: HashMap<Uuid, InstructorPayoutEntity>,
    payout_sessions: Vec<PayoutSessionEntity>,
}

/// Store with the same transactional semantics as Postgres, kept in process memory.
///
/// Transactions are serialized behind one mutex and run against a copy of the state that
/// replaces the original only when the closure succeeds. Row constraints of the SQL schema
/// are checked on write.
#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    state: Mutex<MemoryState>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn seed<F>(&self, apply: F) -> BookingResult<()>
    where
        F: FnOnce(&mut MemoryState),
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BookingError::Internal(anyhow!("in-memory store lock poisoned")))?;
        apply(&mut state);
        Ok(())
    }

    pub fn seed_user(&self, user: AppUserEntity) -> BookingResult<()> {
        self.seed(|state| {
            state.users.insert(user.id, user);
        })
    }

    pub fn seed_instructor_profile(&self, profile: InstructorProfileEntity) -> BookingResult<()> {
        self.seed(|state| {
            state.profiles.insert(profile.user_id, profile);
        })
    }

    pub fn seed_offering(&self, offering: SessionOfferingEntity) -> BookingResult<()> {
        self.seed(|state| {
            state.offerings.insert(offering.id, offering);
        })
    }
}

impl BookingStore for InMemoryBookingStore {
    fn run_in_transaction<T, F>(&self, work: F) -> BookingResult<T>
    where
        T: Send,
        F: FnOnce(&mut dyn StoreTx) -> BookingResult<T>,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BookingError::Internal(anyhow!("in-memory store lock poisoned")))?;

        let mut working = state.clone();
        let value = work(&mut MemoryTx {
            state: &mut working,
        })?;
        *state = working;

        Ok(value)
    }
}

struct MemoryTx<'a> {
    state: &'a mut MemoryState,
}

fn paginate<T>(mut rows: Vec<T>, offset: Option<i64>, limit: Option<i64>) -> Vec<T> {
    let offset = offset.unwrap_or(0).max(0) as usize;
    if offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..offset);
    if let Some(limit) = limit {
        rows.truncate(limit.max(0) as usize);
    }
    rows
}

fn is_outstanding(booking: &BookingRequestEntity) -> bool {
    booking.status == BookingStatus::Pending.as_str()
        || booking.status == BookingStatus::Accepted.as_str()
}

impl MemoryTx<'_> {
    fn check_slot_row(slot: &TimeSlotEntity) -> Result<()> {
        ensure!(
            slot.current_bookings >= 0 && slot.current_bookings <= slot.max_bookings,
            "time_slots check violated: current_bookings {} outside 0..={}",
            slot.current_bookings,
            slot.max_bookings
        );
        ensure!(
            slot.is_booked == (slot.current_bookings >= slot.max_bookings),
            "time_slots check violated: is_booked out of sync"
        );
        Ok(())
    }

    fn check_outstanding_unique(&self, booking: &BookingRequestEntity) -> Result<()> {
        if !is_outstanding(booking) {
            return Ok(());
        }
        let duplicate = self.state.bookings.values().any(|other| {
            other.id != booking.id
                && other.consumer_id == booking.consumer_id
                && other.offering_id == booking.offering_id
                && is_outstanding(other)
        });
        ensure!(
            !duplicate,
            "uq_booking_requests_outstanding violated for consumer {}",
            booking.consumer_id
        );
        ensure!(booking.reschedule_count <= 3, "reschedule_count check violated");
        Ok(())
    }
}

impl StoreTx for MemoryTx<'_> {
    fn find_user(&mut self, user_id: Uuid) -> Result<Option<AppUserEntity>> {
        Ok(self.state.users.get(&user_id).cloned())
    }

    fn find_instructor_profile(
        &mut self,
        instructor_id: Uuid,
    ) -> Result<Option<InstructorProfileEntity>> {
        Ok(self.state.profiles.get(&instructor_id).cloned())
    }

    fn find_offering(&mut self, offering_id: Uuid) -> Result<Option<SessionOfferingEntity>> {
        Ok(self.state.offerings.get(&offering_id).cloned())
    }

    fn bump_offering_stats(
        &mut self,
        offering_id: Uuid,
        bookings_delta: i32,
        sessions_delta: i32,
    ) -> Result<()> {
        if let Some(offering) = self.state.offerings.get_mut(&offering_id) {
            offering.total_bookings += bookings_delta;
            offering.total_sessions += sessions_delta;
            offering.updated_at = Utc::now();
        }
        Ok(())
    }

    fn insert_availability(&mut self, availability: &AvailabilityEntity) -> Result<()> {
        ensure!(
            availability.start_time < availability.end_time,
            "instructor_availabilities check violated: start_time >= end_time"
        );
        self.state
            .availabilities
            .insert(availability.id, availability.clone());
        Ok(())
    }

    fn find_availability(&mut self, availability_id: Uuid) -> Result<Option<AvailabilityEntity>> {
        Ok(self.state.availabilities.get(&availability_id).cloned())
    }

    fn update_availability(&mut self, availability: &AvailabilityEntity) -> Result<()> {
        ensure!(
            availability.start_time < availability.end_time,
            "instructor_availabilities check violated: start_time >= end_time"
        );
        self.state
            .availabilities
            .insert(availability.id, availability.clone());
        Ok(())
    }

    fn delete_availability(&mut self, availability_id: Uuid) -> Result<()> {
        if self.availability_has_references(availability_id)? {
            bail!("time_slots of availability {availability_id} are still referenced");
        }
        self.state.availabilities.remove(&availability_id);
        self.state
            .slots
            .retain(|_, slot| slot.availability_id != availability_id);
        Ok(())
    }

    fn list_availabilities_between(
        &mut self,
        instructor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityEntity>> {
        let mut availabilities: Vec<_> = self
            .state
            .availabilities
            .values()
            .filter(|a| a.instructor_id == instructor_id && a.date >= from && a.date <= to)
            .cloned()
            .collect();
        availabilities.sort_by_key(|a| (a.date, a.start_time));
        Ok(availabilities)
    }

    fn insert_slots(&mut self, slots: &[TimeSlotEntity]) -> Result<()> {
        for slot in slots {
            Self::check_slot_row(slot)?;
            self.state.slots.insert(slot.id, slot.clone());
        }
        Ok(())
    }

    fn list_slots_for_availability(
        &mut self,
        availability_id: Uuid,
    ) -> Result<Vec<TimeSlotEntity>> {
        let mut slots: Vec<_> = self
            .state
            .slots
            .values()
            .filter(|slot| slot.availability_id == availability_id)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_at);
        Ok(slots)
    }

    fn delete_slots_for_availability(&mut self, availability_id: Uuid) -> Result<usize> {
        let before = self.state.slots.len();
        self.state
            .slots
            .retain(|_, slot| slot.availability_id != availability_id);
        Ok(before - self.state.slots.len())
    }

    fn set_availability_slots_available(
        &mut self,
        availability_id: Uuid,
        available: bool,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut changed = 0;
        for slot in self.state.slots.values_mut() {
            if slot.availability_id == availability_id && slot.is_available != available {
                slot.is_available = available;
                slot.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn availability_has_references(&mut self, availability_id: Uuid) -> Result<bool> {
        let slot_ids: Vec<Uuid> = self
            .state
            .slots
            .values()
            .filter(|slot| slot.availability_id == availability_id)
            .map(|slot| slot.id)
            .collect();

        let referenced = |slot_id: Option<Uuid>| slot_id.is_some_and(|id| slot_ids.contains(&id));
        Ok(self.state.bookings.values().any(|b| referenced(b.slot_id))
            || self.state.sessions.values().any(|s| referenced(s.slot_id)))
    }

    fn find_slot_for_update(&mut self, slot_id: Uuid) -> Result<Option<TimeSlotEntity>> {
        Ok(self.state.slots.get(&slot_id).cloned())
    }

    fn write_slot_capacity(
        &mut self,
        slot_id: Uuid,
        current_bookings: i32,
        is_booked: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let slot = self
            .state
            .slots
            .get_mut(&slot_id)
            .ok_or_else(|| anyhow!("time slot {slot_id} does not exist"))?;
        let mut updated = slot.clone();
        updated.current_bookings = current_bookings;
        updated.is_booked = is_booked;
        updated.updated_at = now;
        Self::check_slot_row(&updated)?;
        *slot = updated;
        Ok(())
    }

    fn set_slot_blocked(
        &mut self,
        slot_id: Uuid,
        blocked: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(slot) = self.state.slots.get_mut(&slot_id) {
            slot.is_blocked = blocked;
            slot.updated_at = now;
        }
        Ok(())
    }

    fn list_slots_in_range(
        &mut self,
        instructor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TimeSlotEntity>> {
        let mut slots: Vec<_> = self
            .state
            .slots
            .values()
            .filter(|slot| {
                slot.instructor_id == instructor_id && slot.start_at < to && slot.end_at > from
            })
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_at);
        Ok(slots)
    }

    fn insert_booking(&mut self, booking: &BookingRequestEntity) -> Result<()> {
        ensure!(
            !self.state.bookings.contains_key(&booking.id),
            "booking request {} already exists",
            booking.id
        );
        self.check_outstanding_unique(booking)?;
        self.state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    fn find_booking(&mut self, booking_id: Uuid) -> Result<Option<BookingRequestEntity>> {
        Ok(self.state.bookings.get(&booking_id).cloned())
    }

    fn find_booking_for_update(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Option<BookingRequestEntity>> {
        Ok(self.state.bookings.get(&booking_id).cloned())
    }

    fn find_booking_by_payment_intent(
        &mut self,
        intent_ref: &str,
    ) -> Result<Option<BookingRequestEntity>> {
        Ok(self
            .state
            .bookings
            .values()
            .find(|b| b.payment_intent_ref.as_deref() == Some(intent_ref))
            .cloned())
    }

    fn update_booking(
        &mut self,
        booking: &BookingRequestEntity,
        expected_status: BookingStatus,
    ) -> Result<bool> {
        let matches = self
            .state
            .bookings
            .get(&booking.id)
            .is_some_and(|stored| stored.status == expected_status.as_str());
        if !matches {
            return Ok(false);
        }
        self.check_outstanding_unique(booking)?;
        self.state.bookings.insert(booking.id, booking.clone());
        Ok(true)
    }

    fn count_pending_holds(&mut self, slot_id: Uuid, excluding: Option<Uuid>) -> Result<i64> {
        Ok(self
            .state
            .bookings
            .values()
            .filter(|b| {
                b.slot_id == Some(slot_id)
                    && b.status == BookingStatus::Pending.as_str()
                    && Some(b.id) != excluding
            })
            .count() as i64)
    }

    fn find_outstanding_booking(
        &mut self,
        consumer_id: Uuid,
        offering_id: Uuid,
    ) -> Result<Option<BookingRequestEntity>> {
        Ok(self
            .state
            .bookings
            .values()
            .find(|b| {
                b.consumer_id == consumer_id && b.offering_id == offering_id && is_outstanding(b)
            })
            .cloned())
    }

    fn list_bookings(&mut self, filter: &BookingListFilter) -> Result<Vec<BookingRequestEntity>> {
        let mut bookings: Vec<_> = self
            .state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        if filter.sort_order == SortOrder::Desc {
            bookings.reverse();
        }
        Ok(paginate(bookings, filter.offset, filter.limit))
    }

    fn list_expired_pending_ids(&mut self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>> {
        let mut expired: Vec<_> = self
            .state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending.as_str() && b.expires_at <= now)
            .map(|b| (b.expires_at, b.id))
            .collect();
        expired.sort();
        Ok(expired
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, id)| id)
            .collect())
    }

    fn insert_session(&mut self, session: &LiveSessionEntity) -> Result<()> {
        ensure!(
            session.current_participants <= session.max_participants,
            "live_sessions check violated: participants above maximum"
        );
        if let Some(booking_id) = session.booking_request_id {
            ensure!(
                !self
                    .state
                    .sessions
                    .values()
                    .any(|s| s.booking_request_id == Some(booking_id)),
                "booking request {booking_id} already has a session"
            );
        }
        self.state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn find_session(&mut self, session_id: Uuid) -> Result<Option<LiveSessionEntity>> {
        Ok(self.state.sessions.get(&session_id).cloned())
    }

    fn find_session_for_update(&mut self, session_id: Uuid) -> Result<Option<LiveSessionEntity>> {
        Ok(self.state.sessions.get(&session_id).cloned())
    }

    fn find_session_by_booking(&mut self, booking_id: Uuid) -> Result<Option<LiveSessionEntity>> {
        Ok(self
            .state
            .sessions
            .values()
            .find(|s| s.booking_request_id == Some(booking_id))
            .cloned())
    }

    fn update_session(
        &mut self,
        session: &LiveSessionEntity,
        expected_status: SessionStatus,
    ) -> Result<bool> {
        let matches = self
            .state
            .sessions
            .get(&session.id)
            .is_some_and(|stored| stored.status == expected_status.as_str());
        if !matches {
            return Ok(false);
        }
        ensure!(
            session.current_participants <= session.max_participants,
            "live_sessions check violated: participants above maximum"
        );
        self.state.sessions.insert(session.id, session.clone());
        Ok(true)
    }

    fn list_active_sessions_overlapping(
        &mut self,
        instructor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LiveSessionEntity>> {
        Ok(self
            .state
            .sessions
            .values()
            .filter(|s| {
                s.instructor_id == instructor_id
                    && SessionStatus::from_str(&s.status).is_some_and(|status| status.is_active())
                    && s.overlaps(from, to)
            })
            .cloned()
            .collect())
    }

    fn list_sessions(&mut self, filter: &SessionListFilter) -> Result<Vec<LiveSessionEntity>> {
        let enrolled: Option<Vec<Uuid>> = filter.participant_id.map(|user_id| {
            self.state
                .participants
                .values()
                .filter(|p| p.user_id == user_id && p.status != ParticipantStatus::Removed.as_str())
                .map(|p| p.session_id)
                .collect()
        });

        let mut sessions: Vec<_> = self
            .state
            .sessions
            .values()
            .filter(|s| {
                filter.instructor_id.is_none_or(|id| s.instructor_id == id)
                    && enrolled.as_ref().is_none_or(|ids| ids.contains(&s.id))
                    && filter.status.is_none_or(|status| s.status == status.as_str())
                    && filter.from.is_none_or(|from| s.scheduled_start_at >= from)
                    && filter.to.is_none_or(|to| s.scheduled_start_at < to)
            })
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.scheduled_start_at);
        if filter.sort_order == SortOrder::Desc {
            sessions.reverse();
        }
        Ok(paginate(sessions, filter.offset, filter.limit))
    }

    fn insert_participant(&mut self, participant: &SessionParticipantEntity) -> Result<()> {
        ensure!(
            !self.state.participants.values().any(|p| {
                p.session_id == participant.session_id && p.user_id == participant.user_id
            }),
            "user {} is already a participant of session {}",
            participant.user_id,
            participant.session_id
        );
        self.state
            .participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    fn find_participant(
        &mut self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SessionParticipantEntity>> {
        Ok(self
            .state
            .participants
            .values()
            .find(|p| p.session_id == session_id && p.user_id == user_id)
            .cloned())
    }

    fn update_participant(&mut self, participant: &SessionParticipantEntity) -> Result<()> {
        self.state
            .participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    fn list_participants(&mut self, session_id: Uuid) -> Result<Vec<SessionParticipantEntity>> {
        let mut participants: Vec<_> = self
            .state
            .participants
            .values()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.enrolled_at);
        Ok(participants)
    }

    fn insert_attendance(&mut self, record: &AttendanceRecordEntity) -> Result<()> {
        self.state.attendance.insert(record.id, record.clone());
        Ok(())
    }

    fn list_open_attendance(&mut self, session_id: Uuid) -> Result<Vec<AttendanceRecordEntity>> {
        Ok(self
            .state
            .attendance
            .values()
            .filter(|r| r.session_id == session_id && r.left_at.is_none())
            .cloned()
            .collect())
    }

    fn update_attendance(&mut self, record: &AttendanceRecordEntity) -> Result<()> {
        self.state.attendance.insert(record.id, record.clone());
        Ok(())
    }

    fn list_payout_eligible_sessions(
        &mut self,
        instructor_id: Uuid,
    ) -> Result<Vec<LiveSessionEntity>> {
        let mut sessions: Vec<_> = self
            .state
            .sessions
            .values()
            .filter(|s| {
                s.instructor_id == instructor_id
                    && s.status == SessionStatus::Completed.as_str()
                    && s.payout_status == SessionPayoutStatus::Eligible.as_str()
            })
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.scheduled_start_at);
        Ok(sessions)
    }

    fn list_instructors_with_eligible_sessions(&mut self, limit: i64) -> Result<Vec<Uuid>> {
        let mut instructors: Vec<Uuid> = self
            .state
            .sessions
            .values()
            .filter(|s| {
                s.status == SessionStatus::Completed.as_str()
                    && s.payout_status == SessionPayoutStatus::Eligible.as_str()
            })
            .map(|s| s.instructor_id)
            .collect();
        instructors.sort();
        instructors.dedup();
        instructors.truncate(limit.max(0) as usize);
        Ok(instructors)
    }

    fn insert_payout(
        &mut self,
        payout: &InstructorPayoutEntity,
        sessions: &[PayoutSessionEntity],
    ) -> Result<()> {
        for row in sessions {
            ensure!(
                self.state.sessions.contains_key(&row.session_id),
                "payout_sessions references missing session {}",
                row.session_id
            );
        }
        self.state.payouts.insert(payout.id, payout.clone());
        self.state.payout_sessions.extend_from_slice(sessions);
        Ok(())
    }

    fn find_payout(&mut self, payout_id: Uuid) -> Result<Option<InstructorPayoutEntity>> {
        Ok(self.state.payouts.get(&payout_id).cloned())
    }

    fn find_payout_for_update(
        &mut self,
        payout_id: Uuid,
    ) -> Result<Option<InstructorPayoutEntity>> {
        Ok(self.state.payouts.get(&payout_id).cloned())
    }

    fn update_payout(&mut self, payout: &InstructorPayoutEntity) -> Result<()> {
        self.state.payouts.insert(payout.id, payout.clone());
        Ok(())
    }

    fn list_payout_sessions(&mut self, payout_id: Uuid) -> Result<Vec<PayoutSessionEntity>> {
        Ok(self
            .state
            .payout_sessions
            .iter()
            .filter(|row| row.payout_id == payout_id)
            .cloned()
            .collect())
    }

    fn set_sessions_payout_status(
        &mut self,
        session_ids: &[Uuid],
        status: SessionPayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for session_id in session_ids {
            if let Some(session) = self.state.sessions.get_mut(session_id) {
                session.payout_status = status.to_string();
                session.updated_at = now;
            }
        }
        Ok(())
    }

    fn transition_session_payout_status(
        &mut self,
        session_id: Uuid,
        from: &[SessionPayoutStatus],
        to: SessionPayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(session) = self.state.sessions.get_mut(&session_id) else {
            return Ok(false);
        };
        if !from.iter().any(|status| session.payout_status == status.as_str()) {
            return Ok(false);
        }
        session.payout_status = to.to_string();
        session.updated_at = now;
        Ok(true)
    }

    fn list_payouts(&mut self, filter: &PayoutListFilter) -> Result<Vec<InstructorPayoutEntity>> {
        let mut payouts: Vec<_> = self
            .state
            .payouts
            .values()
            .filter(|p| {
                filter.instructor_id.is_none_or(|id| p.instructor_id == id)
                    && filter.status.is_none_or(|status| p.status == status.as_str())
            })
            .cloned()
            .collect();
        payouts.sort_by_key(|p| p.created_at);
        if filter.sort_order == SortOrder::Desc {
            payouts.reverse();
        }
        Ok(paginate(payouts, filter.offset, filter.limit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn slot(max_bookings: i32) -> TimeSlotEntity {
        let now = Utc::now();
        TimeSlotEntity {
            id: Uuid::new_v4(),
            availability_id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            start_at: now + Duration::days(2),
            end_at: now + Duration::days(2) + Duration::minutes(30),
            duration_minutes: 30,
            max_bookings,
            current_bookings: 0,
            is_available: true,
            is_booked: false,
            is_blocked: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn failed_transaction_leaves_state_untouched() {
        let store = InMemoryBookingStore::new();
        let slot = slot(1);
        let slot_id = slot.id;

        let result: BookingResult<()> = store.run_in_transaction(|tx| {
            tx.insert_slots(&[slot])?;
            Err(BookingError::Conflict("abort".to_string()))
        });
        assert!(matches!(result, Err(BookingError::Conflict(_))));

        let found = store
            .run_in_transaction(|tx| Ok(tx.find_slot_for_update(slot_id)?))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn capacity_write_enforces_row_checks() {
        let store = InMemoryBookingStore::new();
        let slot = slot(1);
        let slot_id = slot.id;
        store
            .run_in_transaction(|tx| Ok(tx.insert_slots(&[slot])?))
            .unwrap();

        let over = store.run_in_transaction(|tx| {
            Ok(tx.write_slot_capacity(slot_id, 2, true, Utc::now())?)
        });
        assert!(matches!(over, Err(BookingError::Internal(_))));

        let out_of_sync = store.run_in_transaction(|tx| {
            Ok(tx.write_slot_capacity(slot_id, 1, false, Utc::now())?)
        });
        assert!(matches!(out_of_sync, Err(BookingError::Internal(_))));
    }

    #[test]
    fn paginate_skips_and_limits() {
        assert_eq!(paginate(vec![1, 2, 3, 4], Some(1), Some(2)), vec![2, 3]);
        assert!(paginate(vec![1, 2], Some(5), None).is_empty());
    }
}
