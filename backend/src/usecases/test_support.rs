use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use crates::{
    domain::{
        entities::{
            app_users::AppUserEntity, availabilities::AvailabilityEntity,
            booking_requests::BookingRequestEntity, instructor_profiles::InstructorProfileEntity,
            live_sessions::LiveSessionEntity, session_offerings::SessionOfferingEntity,
            time_slots::TimeSlotEntity,
        },
        repositories::{
            booking_store::BookingStore, notification_dispatcher::MockNotificationDispatcher,
            payment_gateway::MockPaymentGateway, video_provider::MockVideoProvider,
        },
        value_objects::enums::{
            booking_modes::BookingMode, booking_statuses::BookingStatus,
            payment_statuses::PaymentStatus, payout_statuses::SessionPayoutStatus,
            session_statuses::SessionStatus,
        },
    },
    infra::memory::booking_store::InMemoryBookingStore,
};
use uuid::Uuid;

use crate::usecases::outbox::EffectRunner;

pub(crate) struct Fixture {
    pub store: Arc<InMemoryBookingStore>,
    pub instructor_id: Uuid,
    pub consumer_id: Uuid,
    pub offering: SessionOfferingEntity,
    pub now: DateTime<Utc>,
}

fn user(id: Uuid, now: DateTime<Utc>) -> AppUserEntity {
    AppUserEntity {
        id,
        status: "active".to_string(),
        created_at: now,
        updated_at: now,
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_auto_accept(true)
    }

    pub fn with_auto_accept(auto_accept: bool) -> Self {
        let now = Self::noon_today();
        let store = Arc::new(InMemoryBookingStore::new());
        let instructor_id = Uuid::new_v4();
        let consumer_id = Uuid::new_v4();

        store.seed_user(user(instructor_id, now)).unwrap();
        store.seed_user(user(consumer_id, now)).unwrap();
        store
            .seed_instructor_profile(InstructorProfileEntity {
                user_id: instructor_id,
                auto_accept_bookings: auto_accept,
                accepting_students: true,
                live_sessions_enabled: true,
                default_cancellation_policy: "FLEXIBLE".to_string(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let offering = SessionOfferingEntity {
            id: Uuid::new_v4(),
            instructor_id,
            title: "Intro to Rust".to_string(),
            description: None,
            duration_minutes: 60,
            max_participants: 1,
            base_price_minor: 10_000,
            currency: "USD".to_string(),
            cancellation_policy: "FLEXIBLE".to_string(),
            auto_accept_bookings: None,
            is_active: true,
            is_public: true,
            total_bookings: 0,
            total_sessions: 0,
            created_at: now,
            updated_at: now,
        };
        store.seed_offering(offering.clone()).unwrap();

        Self {
            store,
            instructor_id,
            consumer_id,
            offering,
            now,
        }
    }

    /// Noon UTC of the current day, so one-hour windows a whole number of hours ahead stay
    /// within a calendar day.
    pub fn noon_today() -> DateTime<Utc> {
        Utc::now()
            .date_naive()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    pub fn add_consumer(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.store.seed_user(user(id, self.now)).unwrap();
        id
    }

    /// Inserts a one-hour slot starting `hours_ahead` from now, with its availability.
    /// A slot running past midnight gets a window that ends at the last second of its day.
    pub fn slot(&self, max_bookings: i32, hours_ahead: i64) -> TimeSlotEntity {
        let start_at = self.now + Duration::hours(hours_ahead);
        let end_at = start_at + Duration::minutes(60);
        let window_end = if end_at.date_naive() == start_at.date_naive() {
            end_at.time()
        } else {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap()
        };
        let availability = AvailabilityEntity {
            id: Uuid::new_v4(),
            instructor_id: self.instructor_id,
            date: start_at.date_naive(),
            start_time: start_at.time(),
            end_time: window_end,
            slot_duration_minutes: 60,
            buffer_minutes: 0,
            min_advance_hours: 0,
            max_advance_hours: 720,
            max_sessions_per_slot: max_bookings,
            auto_accept_bookings: None,
            price_override_minor: None,
            timezone: "UTC".to_string(),
            is_active: true,
            created_at: self.now,
            updated_at: self.now,
        };
        let slot = TimeSlotEntity {
            id: Uuid::new_v4(),
            availability_id: availability.id,
            instructor_id: self.instructor_id,
            start_at,
            end_at,
            duration_minutes: 60,
            max_bookings,
            current_bookings: 0,
            is_available: true,
            is_booked: false,
            is_blocked: false,
            created_at: self.now,
            updated_at: self.now,
        };

        let stored = slot.clone();
        self.store
            .run_in_transaction(|tx| {
                tx.insert_availability(&availability)?;
                tx.insert_slots(&[stored])?;
                Ok(())
            })
            .unwrap();
        slot
    }

    pub fn session_entity(&self, status: SessionStatus, start_at: DateTime<Utc>) -> LiveSessionEntity {
        LiveSessionEntity {
            id: Uuid::new_v4(),
            instructor_id: self.instructor_id,
            offering_id: Some(self.offering.id),
            booking_request_id: None,
            slot_id: None,
            title: "Group class".to_string(),
            description: None,
            scheduled_start_at: start_at,
            scheduled_end_at: start_at + Duration::minutes(60),
            duration_minutes: 60,
            actual_start_at: None,
            actual_end_at: None,
            actual_duration_minutes: None,
            status: status.as_str().to_string(),
            max_participants: 5,
            current_participants: 0,
            price_per_person_minor: 5_000,
            platform_fee_minor: 500,
            instructor_payout_minor: 4_500,
            total_revenue_minor: 0,
            currency: "USD".to_string(),
            cancellation_policy: "FLEXIBLE".to_string(),
            payment_intent_ref: None,
            payout_status: SessionPayoutStatus::Pending.as_str().to_string(),
            meeting_room_id: None,
            meeting_join_url: None,
            recording_url: None,
            cancellation_reason: None,
            created_at: self.now,
            updated_at: self.now,
        }
    }

    pub fn insert_session(&self, session: &LiveSessionEntity) {
        self.store
            .run_in_transaction(|tx| Ok(tx.insert_session(session)?))
            .unwrap();
    }

    pub fn completed_session(&self, intent_ref: Option<&str>) -> LiveSessionEntity {
        let mut session =
            self.session_entity(SessionStatus::Completed, self.now - Duration::hours(2));
        session.current_participants = 1;
        session.total_revenue_minor = 5_000;
        session.actual_end_at = Some(self.now - Duration::hours(1));
        session.payment_intent_ref = intent_ref.map(str::to_string);
        self.insert_session(&session);
        session
    }

    /// Completed session already captured and waiting for a payout batch.
    pub fn eligible_session(&self, currency: &str, start_at: DateTime<Utc>) -> LiveSessionEntity {
        let mut session = self.session_entity(SessionStatus::Completed, start_at);
        session.current_participants = 2;
        session.total_revenue_minor = 10_000;
        session.currency = currency.to_string();
        session.payout_status = SessionPayoutStatus::Eligible.as_str().to_string();
        self.insert_session(&session);
        session
    }

    pub fn paid_booking(&self, intent_ref: &str, price_minor: i64) -> BookingRequestEntity {
        let booking = BookingRequestEntity {
            id: Uuid::new_v4(),
            offering_id: self.offering.id,
            consumer_id: self.consumer_id,
            instructor_id: self.instructor_id,
            slot_id: None,
            mode: BookingMode::Request.as_str().to_string(),
            status: BookingStatus::Accepted.as_str().to_string(),
            requested_start_at: Some(self.now + Duration::hours(30)),
            requested_end_at: Some(self.now + Duration::hours(31)),
            offered_price_minor: price_minor,
            final_price_minor: None,
            currency: "USD".to_string(),
            expires_at: self.now + Duration::hours(30),
            reschedule_count: 0,
            payment_status: PaymentStatus::Paid.as_str().to_string(),
            payment_intent_ref: Some(intent_ref.to_string()),
            refunded_amount_minor: 0,
            consumer_message: None,
            instructor_response: None,
            cancellation_reason: None,
            cancelled_by: None,
            responded_at: Some(self.now),
            created_at: self.now,
            updated_at: self.now,
        };
        self.store
            .run_in_transaction(|tx| Ok(tx.insert_booking(&booking)?))
            .unwrap();
        booking
    }

    pub fn booking(&self, booking_id: Uuid) -> BookingRequestEntity {
        self.store
            .run_in_transaction(|tx| Ok(tx.find_booking(booking_id)?))
            .unwrap()
            .unwrap()
    }

    pub fn session(&self, session_id: Uuid) -> LiveSessionEntity {
        self.store
            .run_in_transaction(|tx| Ok(tx.find_session(session_id)?))
            .unwrap()
            .unwrap()
    }

    pub fn slot_row(&self, slot_id: Uuid) -> TimeSlotEntity {
        self.store
            .run_in_transaction(|tx| Ok(tx.find_slot_for_update(slot_id)?))
            .unwrap()
            .unwrap()
    }
}

pub(crate) type TestRunner = EffectRunner<
    InMemoryBookingStore,
    MockPaymentGateway,
    MockVideoProvider,
    MockNotificationDispatcher,
>;

/// Notifier that accepts everything.
pub(crate) fn quiet_notifier() -> MockNotificationDispatcher {
    let mut notifier = MockNotificationDispatcher::new();
    notifier
        .expect_notify()
        .returning(|_| Box::pin(async move { Ok(()) }));
    notifier
}

pub(crate) fn runner(
    fixture: &Fixture,
    payments: MockPaymentGateway,
    video: MockVideoProvider,
    notifier: MockNotificationDispatcher,
) -> TestRunner {
    EffectRunner::new(
        Arc::clone(&fixture.store),
        Arc::new(payments),
        Arc::new(video),
        Arc::new(notifier),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_starting_late_in_the_day_keep_a_valid_window() {
        let mut fixture = Fixture::new();
        fixture.now = Fixture::noon_today() + Duration::minutes(11 * 60 + 30);

        let slot = fixture.slot(1, 48);
        let availability = fixture
            .store
            .run_in_transaction(|tx| Ok(tx.find_availability(slot.availability_id)?))
            .unwrap()
            .unwrap();

        assert!(slot.end_at.date_naive() > slot.start_at.date_naive());
        assert!(availability.start_time < availability.end_time);
        assert_eq!(availability.date, slot.start_at.date_naive());
    }
}
