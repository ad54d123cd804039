use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
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
    errors::BookingResult,
    value_objects::{
        bookings::BookingListFilter,
        enums::{
            booking_statuses::BookingStatus, payout_statuses::SessionPayoutStatus,
            session_statuses::SessionStatus,
        },
        payouts::PayoutListFilter,
        sessions::SessionListFilter,
    },
};

/// Unit-of-work entry point. Every multi-step mutation of the engine runs inside one call.
///
/// The closure runs against an isolated transaction that commits only when it returns `Ok`.
/// It must stay synchronous and short: external calls happen before or after it.
pub trait BookingStore: Send + Sync + 'static {
    fn run_in_transaction<T, F>(&self, work: F) -> BookingResult<T>
    where
        T: Send,
        F: FnOnce(&mut dyn StoreTx) -> BookingResult<T>;
}

/// Row operations available inside a transaction.
///
/// `*_for_update` reads lock the row until the transaction ends. `update_booking` and
/// `update_session` are compare-and-swap on status and return `false` when the stored
/// status no longer matches.
pub trait StoreTx {
    fn find_user(&mut self, user_id: Uuid) -> Result<Option<AppUserEntity>>;
    fn find_instructor_profile(
        &mut self,
        instructor_id: Uuid,
    ) -> Result<Option<InstructorProfileEntity>>;
    fn find_offering(&mut self, offering_id: Uuid) -> Result<Option<SessionOfferingEntity>>;
    fn bump_offering_stats(
        &mut self,
        offering_id: Uuid,
        bookings_delta: i32,
        sessions_delta: i32,
    ) -> Result<()>;

    fn insert_availability(&mut self, availability: &AvailabilityEntity) -> Result<()>;
    fn find_availability(&mut self, availability_id: Uuid) -> Result<Option<AvailabilityEntity>>;
    fn update_availability(&mut self, availability: &AvailabilityEntity) -> Result<()>;
    fn delete_availability(&mut self, availability_id: Uuid) -> Result<()>;
    fn list_availabilities_between(
        &mut self,
        instructor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityEntity>>;

    fn insert_slots(&mut self, slots: &[TimeSlotEntity]) -> Result<()>;
    fn list_slots_for_availability(&mut self, availability_id: Uuid)
    -> Result<Vec<TimeSlotEntity>>;
    fn delete_slots_for_availability(&mut self, availability_id: Uuid) -> Result<usize>;
    /// Sets `is_available` on every slot of the availability and returns how many changed.
    fn set_availability_slots_available(
        &mut self,
        availability_id: Uuid,
        available: bool,
        now: DateTime<Utc>,
    ) -> Result<usize>;
    /// Whether any slot of the availability is referenced by a booking request or session.
    fn availability_has_references(&mut self, availability_id: Uuid) -> Result<bool>;
    fn find_slot_for_update(&mut self, slot_id: Uuid) -> Result<Option<TimeSlotEntity>>;
    /// Counter write used by the capacity ledger only.
    fn write_slot_capacity(
        &mut self,
        slot_id: Uuid,
        current_bookings: i32,
        is_booked: bool,
        now: DateTime<Utc>,
    ) -> Result<()>;
    fn set_slot_blocked(&mut self, slot_id: Uuid, blocked: bool, now: DateTime<Utc>)
    -> Result<()>;
    fn list_slots_in_range(
        &mut self,
        instructor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TimeSlotEntity>>;

    fn insert_booking(&mut self, booking: &BookingRequestEntity) -> Result<()>;
    fn find_booking(&mut self, booking_id: Uuid) -> Result<Option<BookingRequestEntity>>;
    fn find_booking_for_update(&mut self, booking_id: Uuid)
    -> Result<Option<BookingRequestEntity>>;
    fn find_booking_by_payment_intent(
        &mut self,
        intent_ref: &str,
    ) -> Result<Option<BookingRequestEntity>>;
    fn update_booking(
        &mut self,
        booking: &BookingRequestEntity,
        expected_status: BookingStatus,
    ) -> Result<bool>;
    /// PENDING requests holding the slot, other than `excluding`.
    fn count_pending_holds(&mut self, slot_id: Uuid, excluding: Option<Uuid>) -> Result<i64>;
    fn find_outstanding_booking(
        &mut self,
        consumer_id: Uuid,
        offering_id: Uuid,
    ) -> Result<Option<BookingRequestEntity>>;
    fn list_bookings(&mut self, filter: &BookingListFilter) -> Result<Vec<BookingRequestEntity>>;
    fn list_expired_pending_ids(&mut self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>>;

    fn insert_session(&mut self, session: &LiveSessionEntity) -> Result<()>;
    fn find_session(&mut self, session_id: Uuid) -> Result<Option<LiveSessionEntity>>;
    fn find_session_for_update(&mut self, session_id: Uuid) -> Result<Option<LiveSessionEntity>>;
    fn find_session_by_booking(&mut self, booking_id: Uuid) -> Result<Option<LiveSessionEntity>>;
    fn update_session(
        &mut self,
        session: &LiveSessionEntity,
        expected_status: SessionStatus,
    ) -> Result<bool>;
    /// SCHEDULED, CONFIRMED and IN_PROGRESS sessions of the instructor overlapping `[from, to)`.
    fn list_active_sessions_overlapping(
        &mut self,
        instructor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LiveSessionEntity>>;
    fn list_sessions(&mut self, filter: &SessionListFilter) -> Result<Vec<LiveSessionEntity>>;

    fn insert_participant(&mut self, participant: &SessionParticipantEntity) -> Result<()>;
    fn find_participant(
        &mut self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SessionParticipantEntity>>;
    fn update_participant(&mut self, participant: &SessionParticipantEntity) -> Result<()>;
    fn list_participants(&mut self, session_id: Uuid) -> Result<Vec<SessionParticipantEntity>>;
    fn insert_attendance(&mut self, record: &AttendanceRecordEntity) -> Result<()>;
    fn list_open_attendance(&mut self, session_id: Uuid) -> Result<Vec<AttendanceRecordEntity>>;
    fn update_attendance(&mut self, record: &AttendanceRecordEntity) -> Result<()>;

    fn list_payout_eligible_sessions(
        &mut self,
        instructor_id: Uuid,
    ) -> Result<Vec<LiveSessionEntity>>;
    fn list_instructors_with_eligible_sessions(&mut self, limit: i64) -> Result<Vec<Uuid>>;
    fn insert_payout(
        &mut self,
        payout: &InstructorPayoutEntity,
        sessions: &[PayoutSessionEntity],
    ) -> Result<()>;
    fn find_payout(&mut self, payout_id: Uuid) -> Result<Option<InstructorPayoutEntity>>;
    fn find_payout_for_update(&mut self, payout_id: Uuid)
    -> Result<Option<InstructorPayoutEntity>>;
    fn update_payout(&mut self, payout: &InstructorPayoutEntity) -> Result<()>;
    fn list_payout_sessions(&mut self, payout_id: Uuid) -> Result<Vec<PayoutSessionEntity>>;
    fn set_sessions_payout_status(
        &mut self,
        session_ids: &[Uuid],
        status: SessionPayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<()>;
    /// Moves one session's payout status to `to` only while it is one of `from`.
    fn transition_session_payout_status(
        &mut self,
        session_id: Uuid,
        from: &[SessionPayoutStatus],
        to: SessionPayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    fn list_payouts(&mut self, filter: &PayoutListFilter) -> Result<Vec<InstructorPayoutEntity>>;
}
