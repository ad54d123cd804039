use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::{
        attendance_records::AttendanceRecordEntity, booking_requests::BookingRequestEntity,
        instructor_profiles::InstructorProfileEntity, live_sessions::LiveSessionEntity,
        session_offerings::SessionOfferingEntity,
        session_participants::SessionParticipantEntity, time_slots::TimeSlotEntity,
    },
    errors::{BookingError, BookingResult},
    repositories::{
        booking_store::{BookingStore, StoreTx},
        notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway,
        video_provider::VideoProvider,
    },
    scheduling::{capacity_ledger, pricing},
    value_objects::{
        clamp_limit,
        enums::{
            booking_statuses::{BookingEvent, BookingStatus},
            cancellation_policies::CancellationPolicy,
            notification_types::NotificationType,
            participant_statuses::ParticipantStatus,
            payout_statuses::SessionPayoutStatus,
            session_statuses::{SessionEvent, SessionStatus},
        },
        notifications::NotificationModel,
        sessions::{
            AttendanceAction, AttendanceModel, CancelSessionModel, CreateSessionModel,
            RescheduleSessionModel, SessionDetailsModel, SessionListFilter, SessionStatsModel,
            UpdateSessionModel,
        },
        settings::BookingSettings,
    },
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    bookings,
    outbox::{Effect, EffectRunner, Outbox},
};

const DEFAULT_CURRENCY: &str = "USD";

fn session_notification(
    session: &LiveSessionEntity,
    user_id: Uuid,
    notification_type: NotificationType,
    title: &str,
    message: String,
) -> NotificationModel {
    NotificationModel::new(
        user_id,
        notification_type,
        title,
        message,
        json!({
            "session_id": session.id,
            "booking_id": session.booking_request_id,
            "scheduled_start_at": session.scheduled_start_at,
        }),
    )
}

/// Queues one notification per seated participant.
fn notify_participants(
    tx: &mut dyn StoreTx,
    session: &LiveSessionEntity,
    notification_type: NotificationType,
    title: &str,
    message: &str,
    outbox: &mut Outbox,
) -> BookingResult<()> {
    for participant in tx.list_participants(session.id)? {
        if participant.status()?.occupies_seat() {
            outbox.notify(session_notification(
                session,
                participant.user_id,
                notification_type,
                title,
                message.to_string(),
            ));
        }
    }
    Ok(())
}

fn load_session_for_update(
    tx: &mut dyn StoreTx,
    session_id: Uuid,
) -> BookingResult<LiveSessionEntity> {
    tx.find_session_for_update(session_id)?
        .ok_or_else(|| BookingError::not_found("live_session", session_id))
}

fn load_owned_for_update(
    tx: &mut dyn StoreTx,
    instructor_id: Uuid,
    session_id: Uuid,
) -> BookingResult<LiveSessionEntity> {
    let session = load_session_for_update(tx, session_id)?;
    if session.instructor_id != instructor_id {
        return Err(BookingError::Forbidden(
            "session belongs to another instructor".to_string(),
        ));
    }
    Ok(session)
}

/// Compare-and-swap write; losing the race surfaces as a conflict.
pub(crate) fn write_session(
    tx: &mut dyn StoreTx,
    session: &LiveSessionEntity,
    expected: SessionStatus,
) -> BookingResult<()> {
    if !tx.update_session(session, expected)? {
        return Err(BookingError::Conflict(format!(
            "session {} was modified concurrently",
            session.id
        )));
    }
    Ok(())
}

/// Rejects a window that overlaps another active session of the instructor.
fn ensure_calendar_free(
    tx: &mut dyn StoreTx,
    instructor_id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> BookingResult<()> {
    let clash = tx
        .list_active_sessions_overlapping(instructor_id, start_at, end_at)?
        .into_iter()
        .find(|other| Some(other.id) != exclude && other.overlaps(start_at, end_at));
    match clash {
        Some(other) => Err(BookingError::Conflict(format!(
            "instructor already has session {} at that time",
            other.id
        ))),
        None => Ok(()),
    }
}

fn enrolment(session_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> SessionParticipantEntity {
    SessionParticipantEntity {
        id: Uuid::new_v4(),
        session_id,
        user_id,
        status: ParticipantStatus::Enrolled.as_str().to_string(),
        enrolled_at: now,
        joined_at: None,
        left_at: None,
        total_minutes: 0,
    }
}

/// Creates the session of an accepted booking and enrols its consumer.
pub(crate) fn materialize_from_booking(
    tx: &mut dyn StoreTx,
    booking: &BookingRequestEntity,
    offering: &SessionOfferingEntity,
    profile: &InstructorProfileEntity,
    slot: Option<&TimeSlotEntity>,
    settings: BookingSettings,
    now: DateTime<Utc>,
) -> BookingResult<LiveSessionEntity> {
    let start_at = match (slot, booking.requested_start_at) {
        (Some(slot), _) => slot.start_at,
        (None, Some(start_at)) => start_at,
        (None, None) => {
            return Err(BookingError::BadRequest(format!(
                "booking {} has neither a slot nor a requested start",
                booking.id
            )));
        }
    };
    let end_at = start_at + Duration::minutes(i64::from(offering.duration_minutes));
    if slot.is_none() {
        ensure_calendar_free(tx, offering.instructor_id, start_at, end_at, None)?;
    }

    let policy = match offering.cancellation_policy() {
        CancellationPolicy::Unrecognized => {
            CancellationPolicy::from_str(&profile.default_cancellation_policy)
        }
        policy => policy,
    };
    let prices = pricing::snapshot(booking.effective_price_minor(), settings.platform_fee_bps);

    let session = LiveSessionEntity {
        id: Uuid::new_v4(),
        instructor_id: booking.instructor_id,
        offering_id: Some(offering.id),
        booking_request_id: Some(booking.id),
        slot_id: slot.map(|slot| slot.id),
        title: offering.title.clone(),
        description: offering.description.clone(),
        scheduled_start_at: start_at,
        scheduled_end_at: end_at,
        duration_minutes: offering.duration_minutes,
        actual_start_at: None,
        actual_end_at: None,
        actual_duration_minutes: None,
        status: SessionStatus::Scheduled.as_str().to_string(),
        max_participants: offering.max_participants.max(1),
        current_participants: 1,
        price_per_person_minor: prices.price_per_person_minor,
        platform_fee_minor: prices.platform_fee_minor,
        instructor_payout_minor: prices.instructor_payout_minor,
        total_revenue_minor: 0,
        currency: booking.currency.clone(),
        cancellation_policy: policy.as_str().to_string(),
        payment_intent_ref: booking.payment_intent_ref.clone(),
        payout_status: SessionPayoutStatus::Pending.as_str().to_string(),
        meeting_room_id: None,
        meeting_join_url: None,
        recording_url: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };
    tx.insert_session(&session)?;
    tx.insert_participant(&enrolment(session.id, booking.consumer_id, now))?;

    info!(
        session_id = %session.id,
        booking_id = %booking.id,
        "sessions: materialized from booking"
    );
    Ok(session)
}

/// Moves a SCHEDULED or CONFIRMED session to a new start, optionally onto another slot.
/// The session passes through RESCHEDULED and re-enters the status it left.
pub(crate) fn move_session(
    tx: &mut dyn StoreTx,
    mut session: LiveSessionEntity,
    new_start_at: DateTime<Utc>,
    new_slot_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> BookingResult<LiveSessionEntity> {
    let from = session.status()?;
    let to = from
        .apply(SessionEvent::Reschedule)?
        .apply(SessionEvent::Resume(from))?;

    if new_start_at <= now {
        return Err(BookingError::BadRequest(
            "new start must be in the future".to_string(),
        ));
    }
    let new_end_at = new_start_at + Duration::minutes(i64::from(session.duration_minutes));
    ensure_calendar_free(
        tx,
        session.instructor_id,
        new_start_at,
        new_end_at,
        Some(session.id),
    )?;

    if new_slot_id != session.slot_id {
        if let Some(slot_id) = new_slot_id {
            capacity_ledger::reserve(tx, slot_id, session.booking_request_id, now)?;
        }
        if let Some(old_slot_id) = session.slot_id {
            capacity_ledger::release(tx, old_slot_id, now)?;
        }
    }

    session.scheduled_start_at = new_start_at;
    session.scheduled_end_at = new_end_at;
    session.slot_id = new_slot_id;
    session.status = to.as_str().to_string();
    session.updated_at = now;
    write_session(tx, &session, from)?;

    info!(
        session_id = %session.id,
        start_at = %new_start_at,
        slot_id = ?new_slot_id,
        "sessions: session moved"
    );
    Ok(session)
}

/// Cancels a non-terminal session and gives its slot place back.
pub(crate) fn cancel_session_row(
    tx: &mut dyn StoreTx,
    mut session: LiveSessionEntity,
    actor_id: Option<Uuid>,
    reason: Option<String>,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> BookingResult<LiveSessionEntity> {
    let from = session.status()?;
    let to = from.apply(SessionEvent::Cancel)?;

    if let Some(slot_id) = session.slot_id {
        capacity_ledger::release(tx, slot_id, now)?;
    }
    if let Some(room_ref) = session.meeting_room_id.clone() {
        outbox.push(Effect::EndRoom {
            session_id: session.id,
            room_ref,
        });
    }

    session.status = to.as_str().to_string();
    session.cancellation_reason = reason;
    session.payout_status = SessionPayoutStatus::NotApplicable.as_str().to_string();
    session.updated_at = now;
    write_session(tx, &session, from)?;

    let message = session
        .cancellation_reason
        .clone()
        .unwrap_or_else(|| format!("\"{}\" was cancelled.", session.title));
    notify_participants(
        tx,
        &session,
        NotificationType::SessionCancelled,
        "Session cancelled",
        &message,
        outbox,
    )?;
    if actor_id != Some(session.instructor_id) {
        outbox.notify(session_notification(
            &session,
            session.instructor_id,
            NotificationType::SessionCancelled,
            "Session cancelled",
            message,
        ));
    }

    info!(session_id = %session.id, actor_id = ?actor_id, "sessions: session cancelled");
    Ok(session)
}

/// Closes every open attendance interval, optionally of one user only.
fn close_attendance(
    tx: &mut dyn StoreTx,
    session_id: Uuid,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> BookingResult<usize> {
    let mut closed = 0;
    for mut record in tx.list_open_attendance(session_id)? {
        if user_id.is_some_and(|user_id| record.user_id != user_id) {
            continue;
        }
        let minutes = record.close(now);
        tx.update_attendance(&record)?;

        if let Some(mut participant) = tx.find_participant(session_id, record.user_id)? {
            participant.total_minutes += minutes;
            participant.left_at = Some(now);
            if participant.status()? == ParticipantStatus::Joined {
                participant.status = ParticipantStatus::Left.as_str().to_string();
            }
            tx.update_participant(&participant)?;
        }
        closed += 1;
    }
    Ok(closed)
}

pub struct SessionUseCase<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    store: Arc<S>,
    effects: EffectRunner<S, P, V, N>,
    settings: BookingSettings,
}

impl<S, P, V, N> SessionUseCase<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    pub fn new(effects: EffectRunner<S, P, V, N>, settings: BookingSettings) -> Self {
        Self {
            store: Arc::clone(effects.store()),
            effects,
            settings,
        }
    }

    /// Creates an instructor-run session, e.g. a group class, optionally on a slot.
    pub fn create(
        &self,
        instructor_id: Uuid,
        model: CreateSessionModel,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        let settings = self.settings;

        let session = self.store.run_in_transaction(|tx| {
            let profile = tx
                .find_instructor_profile(instructor_id)?
                .ok_or_else(|| BookingError::not_found("instructor_profile", instructor_id))?;
            if !profile.live_sessions_enabled {
                return Err(BookingError::PolicyViolation(
                    "live sessions are disabled for this instructor".to_string(),
                ));
            }

            let offering = match model.offering_id {
                Some(offering_id) => {
                    let offering = tx
                        .find_offering(offering_id)?
                        .ok_or_else(|| BookingError::not_found("session_offering", offering_id))?;
                    if offering.instructor_id != instructor_id {
                        return Err(BookingError::Forbidden(
                            "offering belongs to another instructor".to_string(),
                        ));
                    }
                    Some(offering)
                }
                None => None,
            };

            let slot = match model.slot_id {
                Some(slot_id) => {
                    let slot = capacity_ledger::inspect(tx, slot_id, None)?.slot;
                    if slot.instructor_id != instructor_id {
                        return Err(BookingError::Forbidden(
                            "slot belongs to another instructor".to_string(),
                        ));
                    }
                    Some(slot)
                }
                None => None,
            };

            let start_at = match (&slot, model.scheduled_start_at) {
                (Some(slot), _) => slot.start_at,
                (None, Some(start_at)) => start_at,
                (None, None) => {
                    return Err(BookingError::BadRequest(
                        "scheduled_start_at is required without a slot".to_string(),
                    ));
                }
            };
            if start_at <= now {
                return Err(BookingError::BadRequest(
                    "session must start in the future".to_string(),
                ));
            }

            let title = model
                .title
                .clone()
                .or_else(|| offering.as_ref().map(|o| o.title.clone()))
                .filter(|title| !title.trim().is_empty())
                .ok_or_else(|| BookingError::BadRequest("title is required".to_string()))?;
            let duration_minutes = model
                .duration_minutes
                .or_else(|| offering.as_ref().map(|o| o.duration_minutes))
                .or_else(|| slot.as_ref().map(|s| s.duration_minutes))
                .ok_or_else(|| {
                    BookingError::BadRequest("duration_minutes is required".to_string())
                })?;
            let max_participants = model
                .max_participants
                .or_else(|| offering.as_ref().map(|o| o.max_participants))
                .unwrap_or(1);
            let price_minor = model
                .price_per_person_minor
                .or_else(|| offering.as_ref().map(|o| o.base_price_minor))
                .unwrap_or(0);
            if duration_minutes <= 0 || max_participants <= 0 || price_minor < 0 {
                return Err(BookingError::BadRequest(
                    "duration, capacity and price must be positive".to_string(),
                ));
            }
            let currency = model
                .currency
                .clone()
                .or_else(|| offering.as_ref().map(|o| o.currency.clone()))
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
            let policy = model
                .cancellation_policy
                .or_else(|| offering.as_ref().map(|o| o.cancellation_policy()))
                .filter(|policy| *policy != CancellationPolicy::Unrecognized)
                .unwrap_or_else(|| {
                    CancellationPolicy::from_str(&profile.default_cancellation_policy)
                });

            let end_at = start_at + Duration::minutes(i64::from(duration_minutes));
            ensure_calendar_free(tx, instructor_id, start_at, end_at, None)?;
            if let Some(slot) = &slot {
                capacity_ledger::reserve(tx, slot.id, None, now)?;
            }

            let prices = pricing::snapshot(price_minor, settings.platform_fee_bps);
            let session = LiveSessionEntity {
                id: Uuid::new_v4(),
                instructor_id,
                offering_id: offering.as_ref().map(|o| o.id),
                booking_request_id: None,
                slot_id: slot.as_ref().map(|s| s.id),
                title,
                description: model
                    .description
                    .clone()
                    .or_else(|| offering.as_ref().and_then(|o| o.description.clone())),
                scheduled_start_at: start_at,
                scheduled_end_at: end_at,
                duration_minutes,
                actual_start_at: None,
                actual_end_at: None,
                actual_duration_minutes: None,
                status: SessionStatus::Scheduled.as_str().to_string(),
                max_participants,
                current_participants: 0,
                price_per_person_minor: prices.price_per_person_minor,
                platform_fee_minor: prices.platform_fee_minor,
                instructor_payout_minor: prices.instructor_payout_minor,
                total_revenue_minor: 0,
                currency,
                cancellation_policy: policy.as_str().to_string(),
                payment_intent_ref: None,
                payout_status: SessionPayoutStatus::Pending.as_str().to_string(),
                meeting_room_id: None,
                meeting_join_url: None,
                recording_url: None,
                cancellation_reason: None,
                created_at: now,
                updated_at: now,
            };
            tx.insert_session(&session)?;
            if let Some(offering) = &offering {
                tx.bump_offering_stats(offering.id, 0, 1)?;
            }
            Ok(session)
        })?;

        info!(session_id = %session.id, %instructor_id, "sessions: session created");
        Ok(session)
    }

    pub fn get(&self, actor_id: Uuid, session_id: Uuid) -> BookingResult<SessionDetailsModel> {
        self.store.run_in_transaction(|tx| {
            let session = tx
                .find_session(session_id)?
                .ok_or_else(|| BookingError::not_found("live_session", session_id))?;
            let participants = tx.list_participants(session_id)?;

            let visible = session.instructor_id == actor_id
                || participants.iter().any(|p| p.user_id == actor_id);
            if !visible {
                return Err(BookingError::Forbidden(
                    "not a participant of this session".to_string(),
                ));
            }
            Ok(SessionDetailsModel {
                session,
                participants,
            })
        })
    }

    pub fn update(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        model: UpdateSessionModel,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        model.validate()?;
        let fee_bps = self.settings.platform_fee_bps;

        self.store.run_in_transaction(|tx| {
            let mut session = load_owned_for_update(tx, instructor_id, session_id)?;
            let status = session.status()?;
            if !matches!(status, SessionStatus::Scheduled | SessionStatus::Confirmed) {
                return Err(BookingError::invalid_transition(
                    "live_session",
                    status,
                    "update",
                ));
            }

            if let Some(title) = &model.title {
                session.title = title.clone();
            }
            if let Some(description) = &model.description {
                session.description = Some(description.clone());
            }
            if let Some(max_participants) = model.max_participants {
                if max_participants < session.current_participants {
                    return Err(BookingError::Conflict(format!(
                        "{} participants are already enrolled",
                        session.current_participants
                    )));
                }
                session.max_participants = max_participants;
            }
            if let Some(price_minor) = model.price_per_person_minor {
                let prices = pricing::snapshot(price_minor, fee_bps);
                session.price_per_person_minor = prices.price_per_person_minor;
                session.platform_fee_minor = prices.platform_fee_minor;
                session.instructor_payout_minor = prices.instructor_payout_minor;
            }
            session.updated_at = now;
            write_session(tx, &session, status)?;
            Ok(session)
        })
    }

    fn transition(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        event: SessionEvent,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        let session = self.store.run_in_transaction(|tx| {
            let mut session = load_owned_for_update(tx, instructor_id, session_id)?;
            let from = session.status()?;
            session.status = from.apply(event)?.as_str().to_string();
            session.updated_at = now;
            write_session(tx, &session, from)?;
            Ok(session)
        })?;

        info!(%session_id, %event, status = %session.status, "sessions: status changed");
        Ok(session)
    }

    pub fn confirm(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        self.transition(instructor_id, session_id, SessionEvent::Confirm, now)
    }

    pub fn unconfirm(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        self.transition(instructor_id, session_id, SessionEvent::Unconfirm, now)
    }

    /// Starts the session, provisioning a meeting room first when it has none.
    pub async fn start(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        let session = self.store.run_in_transaction(|tx| {
            let session = load_owned_for_update(tx, instructor_id, session_id)?;
            session.status()?.apply(SessionEvent::Start)?;
            Ok(session)
        })?;

        let created = match session.meeting_room_id {
            Some(_) => None,
            None => {
                let room = self
                    .effects
                    .video()
                    .create_room(session_id, instructor_id)
                    .await
                    .map_err(|err| {
                        error!(%session_id, error = ?err, "sessions: failed to create meeting room");
                        BookingError::external("video_provider", err)
                    })?;
                Some(room)
            }
        };

        let result = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let mut session = load_owned_for_update(tx, instructor_id, session_id)?;
            let from = session.status()?;
            let to = from.apply(SessionEvent::Start)?;

            let mut unused_room = None;
            match (&created, &session.meeting_room_id) {
                (Some(room), None) => {
                    session.meeting_room_id = Some(room.room_ref.clone());
                    session.meeting_join_url = Some(room.join_url.clone());
                }
                (Some(room), Some(_)) => unused_room = Some(room.room_ref.clone()),
                (None, _) => {}
            }

            session.status = to.as_str().to_string();
            session.actual_start_at = Some(now);
            session.updated_at = now;
            write_session(tx, &session, from)?;

            let message = match &session.meeting_join_url {
                Some(url) => format!("\"{}\" has started: {url}", session.title),
                None => format!("\"{}\" has started.", session.title),
            };
            notify_participants(
                tx,
                &session,
                NotificationType::SessionStarted,
                "Session started",
                &message,
                &mut outbox,
            )?;
            if let Some(room_ref) = unused_room {
                outbox.push(Effect::EndRoom {
                    session_id,
                    room_ref,
                });
            }
            Ok((session, outbox))
        });

        match result {
            Ok((session, outbox)) => {
                info!(%session_id, room = ?session.meeting_room_id, "sessions: session started");
                self.effects.flush(outbox).await;
                Ok(session)
            }
            Err(err) => {
                if let Some(room) = created {
                    warn!(%session_id, room_ref = %room.room_ref, "sessions: start lost, tearing down room");
                    let mut teardown = Outbox::new();
                    teardown.push(Effect::EndRoom {
                        session_id,
                        room_ref: room.room_ref,
                    });
                    self.effects.flush(teardown).await;
                }
                Err(err)
            }
        }
    }

    /// Completes the session. Capture, room teardown and recording lookup run after
    /// commit and never roll the completion back.
    pub async fn end(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        let outbox = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let mut session = load_owned_for_update(tx, instructor_id, session_id)?;
            let from = session.status()?;
            let to = from.apply(SessionEvent::End)?;

            session.actual_duration_minutes = Some(match session.actual_start_at {
                Some(started) => (now - started).num_minutes().max(0) as i32,
                None => session.duration_minutes,
            });
            session.actual_end_at = Some(now);
            session.total_revenue_minor =
                pricing::total_revenue(session.price_per_person_minor, session.current_participants);
            session.status = to.as_str().to_string();
            session.updated_at = now;
            write_session(tx, &session, from)?;

            if let Some(booking_id) = session.booking_request_id {
                let mut booking = bookings::load_booking_for_update(tx, booking_id)?;
                let booking_from = booking.status()?;
                if booking_from == BookingStatus::Accepted {
                    booking.status = booking_from
                        .apply(BookingEvent::Complete)?
                        .as_str()
                        .to_string();
                    booking.updated_at = now;
                    bookings::write_booking(tx, &booking, booking_from)?;
                }
            }
            close_attendance(tx, session_id, None, now)?;

            outbox.push(Effect::Capture { session_id });
            if let Some(room_ref) = session.meeting_room_id.clone() {
                outbox.push(Effect::EndRoom {
                    session_id,
                    room_ref: room_ref.clone(),
                });
                outbox.push(Effect::FetchRecording {
                    session_id,
                    room_ref,
                });
            }
            notify_participants(
                tx,
                &session,
                NotificationType::SessionCompleted,
                "Session completed",
                &format!("\"{}\" has ended.", session.title),
                &mut outbox,
            )?;
            Ok(outbox)
        })?;

        info!(%session_id, "sessions: session completed");
        self.effects.flush(outbox).await;

        self.store
            .run_in_transaction(|tx| Ok(tx.find_session(session_id)?))?
            .ok_or_else(|| BookingError::not_found("live_session", session_id))
    }

    /// Cancels the session and the booking it came from, refunding a paid booking
    /// under the session's policy.
    pub async fn cancel(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        model: CancelSessionModel,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        let (session, outbox) = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let session = load_owned_for_update(tx, instructor_id, session_id)?;
            let session = cancel_session_row(
                tx,
                session,
                Some(instructor_id),
                model.reason.clone(),
                now,
                &mut outbox,
            )?;

            if let Some(booking_id) = session.booking_request_id {
                let booking = bookings::load_booking_for_update(tx, booking_id)?;
                if booking.status()?.is_outstanding() {
                    bookings::cancel_booking_row(
                        tx,
                        booking,
                        Some(&session),
                        instructor_id,
                        model.reason.clone(),
                        session.slot_id.is_some(),
                        now,
                        &mut outbox,
                    )?;
                }
            }
            Ok((session, outbox))
        })?;

        self.effects.flush(outbox).await;
        Ok(session)
    }

    /// Moves the session to a new slot or a new start time. A time-only move leaves
    /// the slot it was on.
    pub async fn reschedule(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        model: RescheduleSessionModel,
        now: DateTime<Utc>,
    ) -> BookingResult<LiveSessionEntity> {
        let (session, outbox) = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let session = load_owned_for_update(tx, instructor_id, session_id)?;

            let new_start_at = match (model.new_slot_id, model.new_start_at) {
                (Some(slot_id), _) => {
                    let slot =
                        capacity_ledger::inspect(tx, slot_id, session.booking_request_id)?.slot;
                    if slot.instructor_id != instructor_id {
                        return Err(BookingError::Forbidden(
                            "slot belongs to another instructor".to_string(),
                        ));
                    }
                    if slot.duration_minutes < session.duration_minutes {
                        return Err(BookingError::BadRequest(format!(
                            "slot lasts {} minutes, the session needs {}",
                            slot.duration_minutes, session.duration_minutes
                        )));
                    }
                    slot.start_at
                }
                (None, Some(start_at)) => start_at,
                (None, None) => {
                    return Err(BookingError::BadRequest(
                        "either new_slot_id or new_start_at is required".to_string(),
                    ));
                }
            };

            let session = move_session(tx, session, new_start_at, model.new_slot_id, now)?;

            if let Some(booking_id) = session.booking_request_id {
                let mut booking = bookings::load_booking_for_update(tx, booking_id)?;
                let status = booking.status()?;
                if status == BookingStatus::Accepted && booking.slot_id != session.slot_id {
                    booking.slot_id = session.slot_id;
                    booking.updated_at = now;
                    bookings::write_booking(tx, &booking, status)?;
                }
            }

            notify_participants(
                tx,
                &session,
                NotificationType::SessionRescheduled,
                "Session rescheduled",
                &model.reason.clone().unwrap_or_else(|| {
                    format!(
                        "\"{}\" now starts at {}.",
                        session.title,
                        session.scheduled_start_at.to_rfc3339()
                    )
                }),
                &mut outbox,
            )?;
            Ok((session, outbox))
        })?;

        info!(%session_id, start_at = %session.scheduled_start_at, "sessions: session rescheduled");
        self.effects.flush(outbox).await;
        Ok(session)
    }

    pub fn add_participant(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<SessionParticipantEntity> {
        self.store.run_in_transaction(|tx| {
            let mut session = load_owned_for_update(tx, instructor_id, session_id)?;
            let status = session.status()?;
            if !status.is_active() {
                return Err(BookingError::invalid_transition(
                    "live_session",
                    status,
                    "enroll",
                ));
            }
            tx.find_user(user_id)?
                .ok_or_else(|| BookingError::not_found("app_user", user_id))?;

            let existing = tx.find_participant(session_id, user_id)?;
            if let Some(participant) = &existing {
                if participant.status()?.occupies_seat() {
                    return Err(BookingError::Conflict(format!(
                        "user {user_id} is already enrolled"
                    )));
                }
            }
            if !session.has_free_seat() {
                return Err(BookingError::CapacityExceeded(format!(
                    "session {session_id} is full ({} seats)",
                    session.max_participants
                )));
            }

            let participant = match existing {
                Some(mut participant) => {
                    participant.status = ParticipantStatus::Enrolled.as_str().to_string();
                    participant.enrolled_at = now;
                    tx.update_participant(&participant)?;
                    participant
                }
                None => {
                    let participant = enrolment(session_id, user_id, now);
                    tx.insert_participant(&participant)?;
                    participant
                }
            };

            session.current_participants += 1;
            session.updated_at = now;
            write_session(tx, &session, status)?;
            Ok(participant)
        })
    }

    pub fn remove_participant(
        &self,
        instructor_id: Uuid,
        session_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<SessionParticipantEntity> {
        self.store.run_in_transaction(|tx| {
            let mut session = load_owned_for_update(tx, instructor_id, session_id)?;
            let status = session.status()?;
            if status.is_terminal() {
                return Err(BookingError::invalid_transition(
                    "live_session",
                    status,
                    "remove_participant",
                ));
            }
            let participant = tx
                .find_participant(session_id, user_id)?
                .ok_or_else(|| BookingError::not_found("session_participant", user_id))?;
            if !participant.status()?.occupies_seat() {
                return Ok(participant);
            }

            close_attendance(tx, session_id, Some(user_id), now)?;
            let mut participant = tx
                .find_participant(session_id, user_id)?
                .ok_or_else(|| BookingError::not_found("session_participant", user_id))?;
            participant.status = ParticipantStatus::Removed.as_str().to_string();
            tx.update_participant(&participant)?;

            session.current_participants = (session.current_participants - 1).max(0);
            session.updated_at = now;
            write_session(tx, &session, status)?;
            Ok(participant)
        })
    }

    /// Records a participant joining or leaving an in-progress session.
    pub fn attendance(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        action: AttendanceAction,
        now: DateTime<Utc>,
    ) -> BookingResult<AttendanceModel> {
        self.store.run_in_transaction(|tx| {
            let session = load_session_for_update(tx, session_id)?;
            let mut participant = tx
                .find_participant(session_id, user_id)?
                .filter(|p| p.status().is_ok_and(|status| status.occupies_seat()))
                .ok_or_else(|| {
                    BookingError::Forbidden("not enrolled in this session".to_string())
                })?;
            let open = tx
                .list_open_attendance(session_id)?
                .into_iter()
                .find(|record| record.user_id == user_id);

            match action {
                AttendanceAction::Join => {
                    let status = session.status()?;
                    if status != SessionStatus::InProgress {
                        return Err(BookingError::invalid_transition(
                            "live_session",
                            status,
                            "join",
                        ));
                    }
                    if open.is_some() {
                        return Err(BookingError::Conflict(
                            "already in the session".to_string(),
                        ));
                    }

                    let record = AttendanceRecordEntity {
                        id: Uuid::new_v4(),
                        session_id,
                        user_id,
                        joined_at: now,
                        left_at: None,
                        minutes_attended: None,
                    };
                    tx.insert_attendance(&record)?;

                    participant.status = ParticipantStatus::Joined.as_str().to_string();
                    participant.joined_at.get_or_insert(now);
                    tx.update_participant(&participant)?;
                    Ok(AttendanceModel {
                        participant,
                        record,
                    })
                }
                AttendanceAction::Leave => {
                    let mut record = open.ok_or_else(|| {
                        BookingError::Conflict("not in the session".to_string())
                    })?;
                    let minutes = record.close(now);
                    tx.update_attendance(&record)?;

                    participant.status = ParticipantStatus::Left.as_str().to_string();
                    participant.left_at = Some(now);
                    participant.total_minutes += minutes;
                    tx.update_participant(&participant)?;
                    Ok(AttendanceModel {
                        participant,
                        record,
                    })
                }
            }
        })
    }

    /// Lists the caller's sessions: as participant when the filter asks for it,
    /// otherwise as instructor.
    pub fn list(
        &self,
        actor_id: Uuid,
        mut filter: SessionListFilter,
    ) -> BookingResult<Vec<LiveSessionEntity>> {
        if filter.participant_id.is_some() {
            filter.participant_id = Some(actor_id);
            filter.instructor_id = None;
        } else {
            filter.instructor_id = Some(actor_id);
        }
        filter.limit = Some(clamp_limit(filter.limit));

        self.store
            .run_in_transaction(|tx| Ok(tx.list_sessions(&filter)?))
            .inspect_err(|err| {
                error!(%actor_id, db_error = ?err, "sessions: failed to list sessions");
            })
    }

    pub fn stats(&self, instructor_id: Uuid) -> BookingResult<SessionStatsModel> {
        let filter = SessionListFilter {
            instructor_id: Some(instructor_id),
            ..Default::default()
        };
        let sessions = self
            .store
            .run_in_transaction(|tx| Ok(tx.list_sessions(&filter)?))?;
        Ok(SessionStatsModel::from_sessions(&sessions))
    }

    /// Re-attempts the capture of a completed session whose capture failed.
    pub async fn retry_capture(
        &self,
        instructor_scope: Option<Uuid>,
        session_id: Uuid,
    ) -> BookingResult<LiveSessionEntity> {
        let session = self
            .store
            .run_in_transaction(|tx| Ok(tx.find_session(session_id)?))?
            .ok_or_else(|| BookingError::not_found("live_session", session_id))?;
        if instructor_scope.is_some_and(|id| id != session.instructor_id) {
            return Err(BookingError::Forbidden(
                "session belongs to another instructor".to_string(),
            ));
        }
        let payout_status = session.payout_status()?;
        if payout_status != SessionPayoutStatus::Failed {
            return Err(BookingError::invalid_transition(
                "session_payout",
                payout_status,
                "retry_capture",
            ));
        }

        let status = self.effects.capture_session(session_id).await?;
        info!(%session_id, payout_status = %status, "sessions: capture retried");

        self.store
            .run_in_transaction(|tx| Ok(tx.find_session(session_id)?))?
            .ok_or_else(|| BookingError::not_found("live_session", session_id))
    }
}
