use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use std::sync::Arc;
use tracing::warn;
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
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{
        app_users, attendance_records, booking_requests, instructor_availabilities,
        instructor_payouts, instructor_profiles, live_sessions, payout_sessions,
        session_offerings, session_participants, time_slots,
    },
};

pub struct BookingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BookingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Why a transaction closure stopped: a domain decision or a database failure.
enum TxAbort {
    Domain(BookingError),
    Diesel(DieselError),
}

impl From<DieselError> for TxAbort {
    fn from(err: DieselError) -> Self {
        TxAbort::Diesel(err)
    }
}

fn conflict_from(err: &DieselError) -> Option<BookingError> {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => Some(
            BookingError::Conflict("concurrent update detected, retry the request".to_string()),
        ),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            Some(BookingError::Conflict(info.message().to_string()))
        }
        _ => None,
    }
}

/// Serialization failures and unique violations raised by a statement inside the
/// closure arrive wrapped in `Internal`; surface them as conflicts.
fn classify(err: BookingError) -> BookingError {
    if let BookingError::Internal(inner) = &err {
        if let Some(mapped) = inner.downcast_ref::<DieselError>().and_then(conflict_from) {
            return mapped;
        }
    }
    err
}

impl BookingStore for BookingPostgres {
    fn run_in_transaction<T, F>(&self, work: F) -> BookingResult<T>
    where
        T: Send,
        F: FnOnce(&mut dyn StoreTx) -> BookingResult<T>,
    {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .map_err(|err| BookingError::Internal(err.into()))?;

        let outcome = conn
            .build_transaction()
            .serializable()
            .run::<T, TxAbort, _>(|conn| {
                let mut tx = PgStoreTx { conn };
                work(&mut tx).map_err(TxAbort::Domain)
            });

        match outcome {
            Ok(value) => Ok(value),
            Err(TxAbort::Domain(err)) => Err(classify(err)),
            Err(TxAbort::Diesel(err)) => match conflict_from(&err) {
                Some(conflict) => {
                    warn!(db_error = ?err, "booking_store: transaction aborted by a concurrent writer");
                    Err(conflict)
                }
                None => Err(BookingError::Internal(err.into())),
            },
        }
    }
}

struct PgStoreTx<'a> {
    conn: &'a mut PgConnection,
}

fn status_strs<const N: usize>(statuses: [SessionStatus; N]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

impl StoreTx for PgStoreTx<'_> {
    fn find_user(&mut self, user_id: Uuid) -> Result<Option<AppUserEntity>> {
        let user = app_users::table
            .find(user_id)
            .select(AppUserEntity::as_select())
            .first::<AppUserEntity>(self.conn)
            .optional()?;
        Ok(user)
    }

    fn find_instructor_profile(
        &mut self,
        instructor_id: Uuid,
    ) -> Result<Option<InstructorProfileEntity>> {
        let profile = instructor_profiles::table
            .find(instructor_id)
            .select(InstructorProfileEntity::as_select())
            .first::<InstructorProfileEntity>(self.conn)
            .optional()?;
        Ok(profile)
    }

    fn find_offering(&mut self, offering_id: Uuid) -> Result<Option<SessionOfferingEntity>> {
        let offering = session_offerings::table
            .find(offering_id)
            .select(SessionOfferingEntity::as_select())
            .first::<SessionOfferingEntity>(self.conn)
            .optional()?;
        Ok(offering)
    }

    fn bump_offering_stats(
        &mut self,
        offering_id: Uuid,
        bookings_delta: i32,
        sessions_delta: i32,
    ) -> Result<()> {
        diesel::update(session_offerings::table.find(offering_id))
            .set((
                session_offerings::total_bookings
                    .eq(session_offerings::total_bookings + bookings_delta),
                session_offerings::total_sessions
                    .eq(session_offerings::total_sessions + sessions_delta),
                session_offerings::updated_at.eq(Utc::now()),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn insert_availability(&mut self, availability: &AvailabilityEntity) -> Result<()> {
        diesel::insert_into(instructor_availabilities::table)
            .values(availability)
            .execute(self.conn)?;
        Ok(())
    }

    fn find_availability(&mut self, availability_id: Uuid) -> Result<Option<AvailabilityEntity>> {
        let availability = instructor_availabilities::table
            .find(availability_id)
            .select(AvailabilityEntity::as_select())
            .for_update()
            .first::<AvailabilityEntity>(self.conn)
            .optional()?;
        Ok(availability)
    }

    fn update_availability(&mut self, availability: &AvailabilityEntity) -> Result<()> {
        diesel::update(instructor_availabilities::table.find(availability.id))
            .set(availability)
            .execute(self.conn)?;
        Ok(())
    }

    fn delete_availability(&mut self, availability_id: Uuid) -> Result<()> {
        diesel::delete(instructor_availabilities::table.find(availability_id))
            .execute(self.conn)?;
        Ok(())
    }

    fn list_availabilities_between(
        &mut self,
        instructor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityEntity>> {
        let availabilities = instructor_availabilities::table
            .filter(instructor_availabilities::instructor_id.eq(instructor_id))
            .filter(instructor_availabilities::date.between(from, to))
            .order((
                instructor_availabilities::date.asc(),
                instructor_availabilities::start_time.asc(),
            ))
            .select(AvailabilityEntity::as_select())
            .load::<AvailabilityEntity>(self.conn)?;
        Ok(availabilities)
    }

    fn insert_slots(&mut self, slots: &[TimeSlotEntity]) -> Result<()> {
        if slots.is_empty() {
            return Ok(());
        }
        diesel::insert_into(time_slots::table)
            .values(slots)
            .execute(self.conn)?;
        Ok(())
    }

    fn list_slots_for_availability(
        &mut self,
        availability_id: Uuid,
    ) -> Result<Vec<TimeSlotEntity>> {
        let slots = time_slots::table
            .filter(time_slots::availability_id.eq(availability_id))
            .order(time_slots::start_at.asc())
            .select(TimeSlotEntity::as_select())
            .load::<TimeSlotEntity>(self.conn)?;
        Ok(slots)
    }

    fn delete_slots_for_availability(&mut self, availability_id: Uuid) -> Result<usize> {
        let deleted =
            diesel::delete(time_slots::table.filter(time_slots::availability_id.eq(availability_id)))
                .execute(self.conn)?;
        Ok(deleted)
    }

    fn set_availability_slots_available(
        &mut self,
        availability_id: Uuid,
        available: bool,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let changed = diesel::update(
            time_slots::table
                .filter(time_slots::availability_id.eq(availability_id))
                .filter(time_slots::is_available.ne(available)),
        )
        .set((
            time_slots::is_available.eq(available),
            time_slots::updated_at.eq(now),
        ))
        .execute(self.conn)?;
        Ok(changed)
    }

    fn availability_has_references(&mut self, availability_id: Uuid) -> Result<bool> {
        let slot_ids = time_slots::table
            .filter(time_slots::availability_id.eq(availability_id))
            .select(time_slots::id)
            .for_update()
            .load::<Uuid>(self.conn)?;
        if slot_ids.is_empty() {
            return Ok(false);
        }

        let bookings = booking_requests::table
            .filter(booking_requests::slot_id.eq_any(&slot_ids))
            .count()
            .get_result::<i64>(self.conn)?;
        if bookings > 0 {
            return Ok(true);
        }

        let sessions = live_sessions::table
            .filter(live_sessions::slot_id.eq_any(&slot_ids))
            .count()
            .get_result::<i64>(self.conn)?;
        Ok(sessions > 0)
    }

    fn find_slot_for_update(&mut self, slot_id: Uuid) -> Result<Option<TimeSlotEntity>> {
        let slot = time_slots::table
            .find(slot_id)
            .select(TimeSlotEntity::as_select())
            .for_update()
            .first::<TimeSlotEntity>(self.conn)
            .optional()?;
        Ok(slot)
    }

    fn write_slot_capacity(
        &mut self,
        slot_id: Uuid,
        current_bookings: i32,
        is_booked: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        diesel::update(time_slots::table.find(slot_id))
            .set((
                time_slots::current_bookings.eq(current_bookings),
                time_slots::is_booked.eq(is_booked),
                time_slots::updated_at.eq(now),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn set_slot_blocked(
        &mut self,
        slot_id: Uuid,
        blocked: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        diesel::update(time_slots::table.find(slot_id))
            .set((
                time_slots::is_blocked.eq(blocked),
                time_slots::updated_at.eq(now),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn list_slots_in_range(
        &mut self,
        instructor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TimeSlotEntity>> {
        let slots = time_slots::table
            .filter(time_slots::instructor_id.eq(instructor_id))
            .filter(time_slots::start_at.lt(to))
            .filter(time_slots::end_at.gt(from))
            .order(time_slots::start_at.asc())
            .select(TimeSlotEntity::as_select())
            .load::<TimeSlotEntity>(self.conn)?;
        Ok(slots)
    }

    fn insert_booking(&mut self, booking: &BookingRequestEntity) -> Result<()> {
        diesel::insert_into(booking_requests::table)
            .values(booking)
            .execute(self.conn)?;
        Ok(())
    }

    fn find_booking(&mut self, booking_id: Uuid) -> Result<Option<BookingRequestEntity>> {
        let booking = booking_requests::table
            .find(booking_id)
            .select(BookingRequestEntity::as_select())
            .first::<BookingRequestEntity>(self.conn)
            .optional()?;
        Ok(booking)
    }

    fn find_booking_for_update(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Option<BookingRequestEntity>> {
        let booking = booking_requests::table
            .find(booking_id)
            .select(BookingRequestEntity::as_select())
            .for_update()
            .first::<BookingRequestEntity>(self.conn)
            .optional()?;
        Ok(booking)
    }

    fn find_booking_by_payment_intent(
        &mut self,
        intent_ref: &str,
    ) -> Result<Option<BookingRequestEntity>> {
        let booking = booking_requests::table
            .filter(booking_requests::payment_intent_ref.eq(intent_ref))
            .select(BookingRequestEntity::as_select())
            .for_update()
            .first::<BookingRequestEntity>(self.conn)
            .optional()?;
        Ok(booking)
    }

    fn update_booking(
        &mut self,
        booking: &BookingRequestEntity,
        expected_status: BookingStatus,
    ) -> Result<bool> {
        let updated = diesel::update(
            booking_requests::table
                .filter(booking_requests::id.eq(booking.id))
                .filter(booking_requests::status.eq(expected_status.as_str())),
        )
        .set(booking)
        .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn count_pending_holds(&mut self, slot_id: Uuid, excluding: Option<Uuid>) -> Result<i64> {
        let pending = booking_requests::table
            .filter(booking_requests::slot_id.eq(slot_id))
            .filter(booking_requests::status.eq(BookingStatus::Pending.as_str()));

        let holds = match excluding {
            Some(booking_id) => pending
                .filter(booking_requests::id.ne(booking_id))
                .count()
                .get_result::<i64>(self.conn)?,
            None => pending.count().get_result::<i64>(self.conn)?,
        };
        Ok(holds)
    }

    fn find_outstanding_booking(
        &mut self,
        consumer_id: Uuid,
        offering_id: Uuid,
    ) -> Result<Option<BookingRequestEntity>> {
        let outstanding = [
            BookingStatus::Pending.as_str(),
            BookingStatus::Accepted.as_str(),
        ];
        let booking = booking_requests::table
            .filter(booking_requests::consumer_id.eq(consumer_id))
            .filter(booking_requests::offering_id.eq(offering_id))
            .filter(booking_requests::status.eq_any(outstanding))
            .select(BookingRequestEntity::as_select())
            .first::<BookingRequestEntity>(self.conn)
            .optional()?;
        Ok(booking)
    }

    fn list_bookings(&mut self, filter: &BookingListFilter) -> Result<Vec<BookingRequestEntity>> {
        let mut query = booking_requests::table
            .select(BookingRequestEntity::as_select())
            .into_boxed();

        if let Some(instructor_id) = filter.instructor_id {
            query = query.filter(booking_requests::instructor_id.eq(instructor_id));
        }
        if let Some(consumer_id) = filter.consumer_id {
            query = query.filter(booking_requests::consumer_id.eq(consumer_id));
        }
        if let Some(offering_id) = filter.offering_id {
            query = query.filter(booking_requests::offering_id.eq(offering_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(booking_requests::status.eq(status.as_str()));
        }

        query = match filter.sort_order {
            SortOrder::Asc => query.order(booking_requests::created_at.asc()),
            SortOrder::Desc => query.order(booking_requests::created_at.desc()),
        };
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let bookings = query.load::<BookingRequestEntity>(self.conn)?;
        Ok(bookings)
    }

    fn list_expired_pending_ids(&mut self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>> {
        let ids = booking_requests::table
            .filter(booking_requests::status.eq(BookingStatus::Pending.as_str()))
            .filter(booking_requests::expires_at.le(now))
            .order(booking_requests::expires_at.asc())
            .limit(limit)
            .select(booking_requests::id)
            .load::<Uuid>(self.conn)?;
        Ok(ids)
    }

    fn insert_session(&mut self, session: &LiveSessionEntity) -> Result<()> {
        diesel::insert_into(live_sessions::table)
            .values(session)
            .execute(self.conn)?;
        Ok(())
    }

    fn find_session(&mut self, session_id: Uuid) -> Result<Option<LiveSessionEntity>> {
        let session = live_sessions::table
            .find(session_id)
            .select(LiveSessionEntity::as_select())
            .first::<LiveSessionEntity>(self.conn)
            .optional()?;
        Ok(session)
    }

    fn find_session_for_update(&mut self, session_id: Uuid) -> Result<Option<LiveSessionEntity>> {
        let session = live_sessions::table
            .find(session_id)
            .select(LiveSessionEntity::as_select())
            .for_update()
            .first::<LiveSessionEntity>(self.conn)
            .optional()?;
        Ok(session)
    }

    fn find_session_by_booking(&mut self, booking_id: Uuid) -> Result<Option<LiveSessionEntity>> {
        let session = live_sessions::table
            .filter(live_sessions::booking_request_id.eq(booking_id))
            .select(LiveSessionEntity::as_select())
            .for_update()
            .first::<LiveSessionEntity>(self.conn)
            .optional()?;
        Ok(session)
    }

    fn update_session(
        &mut self,
        session: &LiveSessionEntity,
        expected_status: SessionStatus,
    ) -> Result<bool> {
        let updated = diesel::update(
            live_sessions::table
                .filter(live_sessions::id.eq(session.id))
                .filter(live_sessions::status.eq(expected_status.as_str())),
        )
        .set(session)
        .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn list_active_sessions_overlapping(
        &mut self,
        instructor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LiveSessionEntity>> {
        let sessions = live_sessions::table
            .filter(live_sessions::instructor_id.eq(instructor_id))
            .filter(live_sessions::status.eq_any(status_strs(SessionStatus::ACTIVE)))
            .filter(live_sessions::scheduled_start_at.lt(to))
            .filter(live_sessions::scheduled_end_at.gt(from))
            .select(LiveSessionEntity::as_select())
            .load::<LiveSessionEntity>(self.conn)?;
        Ok(sessions)
    }

    fn list_sessions(&mut self, filter: &SessionListFilter) -> Result<Vec<LiveSessionEntity>> {
        let mut query = live_sessions::table
            .select(LiveSessionEntity::as_select())
            .into_boxed();

        if let Some(instructor_id) = filter.instructor_id {
            query = query.filter(live_sessions::instructor_id.eq(instructor_id));
        }
        if let Some(participant_id) = filter.participant_id {
            let session_ids = session_participants::table
                .filter(session_participants::user_id.eq(participant_id))
                .filter(session_participants::status.ne(ParticipantStatus::Removed.as_str()))
                .select(session_participants::session_id)
                .load::<Uuid>(self.conn)?;
            query = query.filter(live_sessions::id.eq_any(session_ids));
        }
        if let Some(status) = filter.status {
            query = query.filter(live_sessions::status.eq(status.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(live_sessions::scheduled_start_at.ge(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(live_sessions::scheduled_start_at.lt(to));
        }

        query = match filter.sort_order {
            SortOrder::Asc => query.order(live_sessions::scheduled_start_at.asc()),
            SortOrder::Desc => query.order(live_sessions::scheduled_start_at.desc()),
        };
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let sessions = query.load::<LiveSessionEntity>(self.conn)?;
        Ok(sessions)
    }

    fn insert_participant(&mut self, participant: &SessionParticipantEntity) -> Result<()> {
        diesel::insert_into(session_participants::table)
            .values(participant)
            .execute(self.conn)?;
        Ok(())
    }

    fn find_participant(
        &mut self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SessionParticipantEntity>> {
        let participant = session_participants::table
            .filter(session_participants::session_id.eq(session_id))
            .filter(session_participants::user_id.eq(user_id))
            .select(SessionParticipantEntity::as_select())
            .for_update()
            .first::<SessionParticipantEntity>(self.conn)
            .optional()?;
        Ok(participant)
    }

    fn update_participant(&mut self, participant: &SessionParticipantEntity) -> Result<()> {
        diesel::update(session_participants::table.find(participant.id))
            .set(participant)
            .execute(self.conn)?;
        Ok(())
    }

    fn list_participants(&mut self, session_id: Uuid) -> Result<Vec<SessionParticipantEntity>> {
        let participants = session_participants::table
            .filter(session_participants::session_id.eq(session_id))
            .order(session_participants::enrolled_at.asc())
            .select(SessionParticipantEntity::as_select())
            .load::<SessionParticipantEntity>(self.conn)?;
        Ok(participants)
    }

    fn insert_attendance(&mut self, record: &AttendanceRecordEntity) -> Result<()> {
        diesel::insert_into(attendance_records::table)
            .values(record)
            .execute(self.conn)?;
        Ok(())
    }

    fn list_open_attendance(&mut self, session_id: Uuid) -> Result<Vec<AttendanceRecordEntity>> {
        let records = attendance_records::table
            .filter(attendance_records::session_id.eq(session_id))
            .filter(attendance_records::left_at.is_null())
            .select(AttendanceRecordEntity::as_select())
            .load::<AttendanceRecordEntity>(self.conn)?;
        Ok(records)
    }

    fn update_attendance(&mut self, record: &AttendanceRecordEntity) -> Result<()> {
        diesel::update(attendance_records::table.find(record.id))
            .set(record)
            .execute(self.conn)?;
        Ok(())
    }

    fn list_payout_eligible_sessions(
        &mut self,
        instructor_id: Uuid,
    ) -> Result<Vec<LiveSessionEntity>> {
        let sessions = live_sessions::table
            .filter(live_sessions::instructor_id.eq(instructor_id))
            .filter(live_sessions::status.eq(SessionStatus::Completed.as_str()))
            .filter(live_sessions::payout_status.eq(SessionPayoutStatus::Eligible.as_str()))
            .order(live_sessions::scheduled_start_at.asc())
            .select(LiveSessionEntity::as_select())
            .for_update()
            .load::<LiveSessionEntity>(self.conn)?;
        Ok(sessions)
    }

    fn list_instructors_with_eligible_sessions(&mut self, limit: i64) -> Result<Vec<Uuid>> {
        let instructors = live_sessions::table
            .filter(live_sessions::status.eq(SessionStatus::Completed.as_str()))
            .filter(live_sessions::payout_status.eq(SessionPayoutStatus::Eligible.as_str()))
            .select(live_sessions::instructor_id)
            .distinct()
            .limit(limit)
            .load::<Uuid>(self.conn)?;
        Ok(instructors)
    }

    fn insert_payout(
        &mut self,
        payout: &InstructorPayoutEntity,
        sessions: &[PayoutSessionEntity],
    ) -> Result<()> {
        diesel::insert_into(instructor_payouts::table)
            .values(payout)
            .execute(self.conn)?;
        diesel::insert_into(payout_sessions::table)
            .values(sessions)
            .execute(self.conn)?;
        Ok(())
    }

    fn find_payout(&mut self, payout_id: Uuid) -> Result<Option<InstructorPayoutEntity>> {
        let payout = instructor_payouts::table
            .find(payout_id)
            .select(InstructorPayoutEntity::as_select())
            .first::<InstructorPayoutEntity>(self.conn)
            .optional()?;
        Ok(payout)
    }

    fn find_payout_for_update(
        &mut self,
        payout_id: Uuid,
    ) -> Result<Option<InstructorPayoutEntity>> {
        let payout = instructor_payouts::table
            .find(payout_id)
            .select(InstructorPayoutEntity::as_select())
            .for_update()
            .first::<InstructorPayoutEntity>(self.conn)
            .optional()?;
        Ok(payout)
    }

    fn update_payout(&mut self, payout: &InstructorPayoutEntity) -> Result<()> {
        diesel::update(instructor_payouts::table.find(payout.id))
            .set(payout)
            .execute(self.conn)?;
        Ok(())
    }

    fn list_payout_sessions(&mut self, payout_id: Uuid) -> Result<Vec<PayoutSessionEntity>> {
        let rows = payout_sessions::table
            .filter(payout_sessions::payout_id.eq(payout_id))
            .select(PayoutSessionEntity::as_select())
            .load::<PayoutSessionEntity>(self.conn)?;
        Ok(rows)
    }

    fn set_sessions_payout_status(
        &mut self,
        session_ids: &[Uuid],
        status: SessionPayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        diesel::update(live_sessions::table.filter(live_sessions::id.eq_any(session_ids)))
            .set((
                live_sessions::payout_status.eq(status.as_str()),
                live_sessions::updated_at.eq(now),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    fn transition_session_payout_status(
        &mut self,
        session_id: Uuid,
        from: &[SessionPayoutStatus],
        to: SessionPayoutStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let from: Vec<&str> = from.iter().map(SessionPayoutStatus::as_str).collect();
        let updated = diesel::update(
            live_sessions::table
                .find(session_id)
                .filter(live_sessions::payout_status.eq_any(from)),
        )
        .set((
            live_sessions::payout_status.eq(to.as_str()),
            live_sessions::updated_at.eq(now),
        ))
        .execute(self.conn)?;
        Ok(updated == 1)
    }

    fn list_payouts(&mut self, filter: &PayoutListFilter) -> Result<Vec<InstructorPayoutEntity>> {
        let mut query = instructor_payouts::table
            .select(InstructorPayoutEntity::as_select())
            .into_boxed();

        if let Some(instructor_id) = filter.instructor_id {
            query = query.filter(instructor_payouts::instructor_id.eq(instructor_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(instructor_payouts::status.eq(status.as_str()));
        }

        query = match filter.sort_order {
            SortOrder::Asc => query.order(instructor_payouts::created_at.asc()),
            SortOrder::Desc => query.order(instructor_payouts::created_at.desc()),
        };
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let payouts = query.load::<InstructorPayoutEntity>(self.conn)?;
        Ok(payouts)
    }
}
