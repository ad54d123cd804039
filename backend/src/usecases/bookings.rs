use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::{
        booking_requests::BookingRequestEntity, live_sessions::LiveSessionEntity,
        session_offerings::SessionOfferingEntity, time_slots::TimeSlotEntity,
    },
    errors::{BookingError, BookingResult},
    repositories::{
        booking_store::{BookingStore, StoreTx},
        notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway,
        video_provider::VideoProvider,
    },
    scheduling::{
        auto_approval::{self, ApprovalContext},
        capacity_ledger, pricing, refund_calculator,
    },
    value_objects::{
        bookings::{
            AcceptBookingModel, BookingDetailsModel, BookingListFilter, BookingRole,
            BookingStatsModel, CancelBookingModel, CreateBookingModel, ExpirySweepReport,
            RefundQuoteModel, RejectBookingModel, RescheduleBookingModel,
        },
        clamp_limit,
        enums::{
            booking_modes::BookingMode,
            booking_statuses::{BookingEvent, BookingStatus},
            cancellation_policies::CancellationPolicy,
            notification_types::NotificationType,
            payment_statuses::PaymentStatus,
        },
        notifications::NotificationModel,
        payments::{IntentRequest, PaymentEvent, PaymentEventOutcome, PaymentIntentModel},
        settings::BookingSettings,
    },
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    outbox::{Effect, EffectRunner, Outbox},
    sessions,
};

/// Result of a decision on a PENDING request that may have lapsed in the meantime.
enum Decided<T> {
    Applied(T),
    Lapsed,
}

pub(crate) fn booking_notification(
    booking: &BookingRequestEntity,
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
            "booking_id": booking.id,
            "offering_id": booking.offering_id,
            "slot_id": booking.slot_id,
        }),
    )
}

pub(crate) fn load_booking_for_update(
    tx: &mut dyn StoreTx,
    booking_id: Uuid,
) -> BookingResult<BookingRequestEntity> {
    tx.find_booking_for_update(booking_id)?
        .ok_or_else(|| BookingError::not_found("booking_request", booking_id))
}

/// Compare-and-swap write; losing the race surfaces as a conflict.
pub(crate) fn write_booking(
    tx: &mut dyn StoreTx,
    booking: &BookingRequestEntity,
    expected: BookingStatus,
) -> BookingResult<()> {
    if !tx.update_booking(booking, expected)? {
        return Err(BookingError::Conflict(format!(
            "booking {} was modified concurrently",
            booking.id
        )));
    }
    Ok(())
}

fn load_offering(tx: &mut dyn StoreTx, offering_id: Uuid) -> BookingResult<SessionOfferingEntity> {
    tx.find_offering(offering_id)?
        .ok_or_else(|| BookingError::not_found("session_offering", offering_id))
}

fn validate_slot_for_offering(
    slot: &TimeSlotEntity,
    offering: &SessionOfferingEntity,
    now: DateTime<Utc>,
) -> BookingResult<()> {
    if slot.instructor_id != offering.instructor_id {
        return Err(BookingError::BadRequest(format!(
            "slot {} belongs to another instructor",
            slot.id
        )));
    }
    if slot.duration_minutes < offering.duration_minutes {
        return Err(BookingError::BadRequest(format!(
            "slot lasts {} minutes, the offering needs {}",
            slot.duration_minutes, offering.duration_minutes
        )));
    }
    if slot.start_at <= now {
        return Err(BookingError::BadRequest(format!(
            "slot {} has already started",
            slot.id
        )));
    }
    Ok(())
}

/// Base price the 50% floor is measured against: the window override, else the offering price.
fn base_price(
    tx: &mut dyn StoreTx,
    offering: &SessionOfferingEntity,
    slot: Option<&TimeSlotEntity>,
) -> BookingResult<i64> {
    let Some(slot) = slot else {
        return Ok(offering.base_price_minor);
    };
    let price_override = tx
        .find_availability(slot.availability_id)?
        .and_then(|availability| availability.price_override_minor);
    Ok(price_override.unwrap_or(offering.base_price_minor))
}

fn ensure_price_floor(price_minor: i64, base_minor: i64) -> BookingResult<()> {
    if price_minor < 0 {
        return Err(BookingError::BadRequest(
            "price must not be negative".to_string(),
        ));
    }
    if !pricing::meets_price_floor(price_minor, base_minor) {
        return Err(BookingError::PolicyViolation(format!(
            "price {price_minor} is below half of the base price {base_minor}"
        )));
    }
    Ok(())
}

/// Moves an overdue PENDING request to EXPIRED. Returns whether it lapsed.
fn lapse_if_expired(
    tx: &mut dyn StoreTx,
    booking: &mut BookingRequestEntity,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> BookingResult<bool> {
    let from = booking.status()?;
    if from != BookingStatus::Pending || !booking.is_expired_at(now) {
        return Ok(false);
    }

    booking.status = from.apply(BookingEvent::Expire)?.as_str().to_string();
    booking.updated_at = now;
    write_booking(tx, booking, from)?;

    outbox.notify(booking_notification(
        booking,
        booking.consumer_id,
        NotificationType::BookingExpired,
        "Booking request expired",
        "The instructor did not respond in time.".to_string(),
    ));
    info!(booking_id = %booking.id, "bookings: request expired");
    Ok(true)
}

/// When the booked session starts, from the session, the slot or the requested time.
fn scheduled_start(
    tx: &mut dyn StoreTx,
    booking: &BookingRequestEntity,
    session: Option<&LiveSessionEntity>,
) -> BookingResult<DateTime<Utc>> {
    if let Some(session) = session {
        return Ok(session.scheduled_start_at);
    }
    if let Some(slot_id) = booking.slot_id {
        if let Some(slot) = tx.find_slot_for_update(slot_id)? {
            return Ok(slot.start_at);
        }
    }
    Ok(booking.requested_start_at.unwrap_or(booking.expires_at))
}

fn cancellation_policy(
    tx: &mut dyn StoreTx,
    booking: &BookingRequestEntity,
    session: Option<&LiveSessionEntity>,
) -> BookingResult<CancellationPolicy> {
    if let Some(session) = session {
        return Ok(session.cancellation_policy());
    }
    Ok(tx
        .find_offering(booking.offering_id)?
        .map(|offering| offering.cancellation_policy())
        .unwrap_or(CancellationPolicy::Unrecognized))
}

/// Refund owed on cancellation of a PAID booking, if any.
fn refund_effect(
    booking: &BookingRequestEntity,
    policy: CancellationPolicy,
    start_at: DateTime<Utc>,
    now: DateTime<Utc>,
    reason: &str,
) -> BookingResult<Option<Effect>> {
    if booking.payment_status()? != PaymentStatus::Paid {
        return Ok(None);
    }
    let Some(intent_ref) = booking.payment_intent_ref.clone() else {
        return Ok(None);
    };

    let hours_until_start = (start_at - now).num_seconds() as f64 / 3600.0;
    let refundable = booking.effective_price_minor() - booking.refunded_amount_minor;
    let amount_minor = refund_calculator::refund_amount(refundable, policy, hours_until_start);

    Ok((amount_minor > 0).then(|| Effect::Refund {
        booking_id: booking.id,
        intent_ref,
        amount_minor,
        reason: reason.to_string(),
    }))
}

/// Cancels an outstanding booking row. The slot place is given back unless the caller
/// already released it through the session.
pub(crate) fn cancel_booking_row(
    tx: &mut dyn StoreTx,
    mut booking: BookingRequestEntity,
    session: Option<&LiveSessionEntity>,
    actor_id: Uuid,
    reason: Option<String>,
    slot_released: bool,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> BookingResult<BookingRequestEntity> {
    let from = booking.status()?;
    let to = from.apply(BookingEvent::Cancel)?;

    if from == BookingStatus::Accepted && !slot_released {
        if let Some(slot_id) = booking.slot_id {
            capacity_ledger::release(tx, slot_id, now)?;
        }
    }

    let policy = cancellation_policy(tx, &booking, session)?;
    let start_at = scheduled_start(tx, &booking, session)?;
    if let Some(refund) = refund_effect(
        &booking,
        policy,
        start_at,
        now,
        reason.as_deref().unwrap_or("booking cancelled"),
    )? {
        outbox.push(refund);
    }

    booking.status = to.as_str().to_string();
    booking.cancellation_reason = reason;
    booking.cancelled_by = Some(actor_id);
    booking.updated_at = now;
    write_booking(tx, &booking, from)?;

    let recipients: Vec<Uuid> = if actor_id == booking.consumer_id {
        vec![booking.instructor_id]
    } else if actor_id == booking.instructor_id {
        vec![booking.consumer_id]
    } else {
        vec![booking.consumer_id, booking.instructor_id]
    };
    for user_id in recipients {
        outbox.notify(booking_notification(
            &booking,
            user_id,
            NotificationType::BookingCancelled,
            "Booking cancelled",
            booking
                .cancellation_reason
                .clone()
                .unwrap_or_else(|| "The booking was cancelled.".to_string()),
        ));
    }

    Ok(booking)
}

pub struct BookingUseCase<S, P, V, N>
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

impl<S, P, V, N> BookingUseCase<S, P, V, N>
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

    /// Creates a request. The slot is locked for the whole unit, and an auto-approved
    /// request takes its place and materializes its session before commit.
    pub async fn create(
        &self,
        consumer_id: Uuid,
        model: CreateBookingModel,
        now: DateTime<Utc>,
    ) -> BookingResult<BookingDetailsModel> {
        let settings = self.settings;

        let (details, outbox) = self
            .store
            .run_in_transaction(|tx| {
                let mut outbox = Outbox::new();

                let offering = load_offering(tx, model.offering_id)?;
                if !offering.is_bookable() {
                    return Err(BookingError::BadRequest(format!(
                        "offering {} is not open for booking",
                        offering.id
                    )));
                }
                tx.find_user(consumer_id)?
                    .ok_or_else(|| BookingError::not_found("app_user", consumer_id))?;
                if consumer_id == offering.instructor_id {
                    return Err(BookingError::BadRequest(
                        "instructors cannot book their own offering".to_string(),
                    ));
                }
                let profile = tx
                    .find_instructor_profile(offering.instructor_id)?
                    .ok_or_else(|| {
                        BookingError::not_found("instructor_profile", offering.instructor_id)
                    })?;
                if let Some(existing) = tx.find_outstanding_booking(consumer_id, offering.id)? {
                    return Err(BookingError::Conflict(format!(
                        "booking {} is already outstanding for this offering",
                        existing.id
                    )));
                }

                let (capacity, availability, start_at, end_at) = match model.slot_id {
                    Some(slot_id) => {
                        let capacity = capacity_ledger::inspect(tx, slot_id, None)?;
                        validate_slot_for_offering(&capacity.slot, &offering, now)?;
                        let availability = tx
                            .find_availability(capacity.slot.availability_id)?
                            .ok_or_else(|| {
                                BookingError::not_found(
                                    "instructor_availability",
                                    capacity.slot.availability_id,
                                )
                            })?;
                        if !availability.is_active {
                            return Err(BookingError::Conflict(format!(
                                "slot {slot_id} is not available"
                            )));
                        }
                        let (start_at, end_at) = (capacity.slot.start_at, capacity.slot.end_at);
                        (Some(capacity), Some(availability), start_at, end_at)
                    }
                    None => {
                        if model.mode == BookingMode::Direct {
                            return Err(BookingError::BadRequest(
                                "direct bookings need a slot".to_string(),
                            ));
                        }
                        let start_at = model.requested_start_at.ok_or_else(|| {
                            BookingError::BadRequest(
                                "requested_start_at is required without a slot".to_string(),
                            )
                        })?;
                        if start_at <= now {
                            return Err(BookingError::BadRequest(
                                "requested start must be in the future".to_string(),
                            ));
                        }
                        let end_at = start_at + Duration::minutes(i64::from(offering.duration_minutes));
                        (None, None, start_at, end_at)
                    }
                };

                let base = availability
                    .as_ref()
                    .and_then(|availability| availability.price_override_minor)
                    .unwrap_or(offering.base_price_minor);
                let offered = model.offered_price_minor.unwrap_or(base);
                ensure_price_floor(offered, base)?;

                // REQUEST mode always asks the instructor, whatever the auto-accept settings.
                let approved = match (&capacity, &availability, model.mode) {
                    (Some(_), Some(_), BookingMode::Request) => {
                        info!(
                            offering_id = %offering.id,
                            "bookings: request mode left for manual review"
                        );
                        false
                    }
                    (Some(capacity), Some(availability), BookingMode::Direct) => {
                        let decision = auto_approval::evaluate(&ApprovalContext {
                            provider_auto_accept: profile.auto_accept_bookings,
                            availability_override: availability.auto_accept(),
                            offering_override: offering.auto_accept(),
                            hours_until_slot: Some(capacity.slot.hours_until_start(now)),
                            min_advance_hours: availability.min_advance_hours,
                            max_advance_hours: availability.max_advance_hours,
                            remaining_capacity: capacity.remaining(),
                            accepting_students: profile.accepting_students,
                            live_sessions_enabled: profile.live_sessions_enabled,
                        });
                        if !decision.auto_approve() {
                            info!(
                                offering_id = %offering.id,
                                reasons = %decision.reasons(),
                                "bookings: left for manual review"
                            );
                        }
                        decision.auto_approve()
                    }
                    _ => false,
                };

                let status = if approved {
                    BookingStatus::Accepted
                } else {
                    BookingStatus::Pending
                };
                let booking = BookingRequestEntity {
                    id: Uuid::new_v4(),
                    offering_id: offering.id,
                    consumer_id,
                    instructor_id: offering.instructor_id,
                    slot_id: model.slot_id,
                    mode: model.mode.as_str().to_string(),
                    status: status.as_str().to_string(),
                    requested_start_at: capacity.is_none().then_some(start_at),
                    requested_end_at: capacity.is_none().then_some(end_at),
                    offered_price_minor: offered,
                    final_price_minor: None,
                    currency: offering.currency.clone(),
                    expires_at: (now + settings.request_ttl()).min(start_at),
                    reschedule_count: 0,
                    payment_status: PaymentStatus::Unpaid.as_str().to_string(),
                    payment_intent_ref: None,
                    refunded_amount_minor: 0,
                    consumer_message: model.consumer_message.clone(),
                    instructor_response: None,
                    cancellation_reason: None,
                    cancelled_by: None,
                    responded_at: approved.then_some(now),
                    created_at: now,
                    updated_at: now,
                };
                tx.insert_booking(&booking)?;

                let session = match (approved, model.slot_id) {
                    (true, Some(slot_id)) => {
                        let slot = capacity_ledger::reserve(tx, slot_id, Some(booking.id), now)?;
                        let session = sessions::materialize_from_booking(
                            tx,
                            &booking,
                            &offering,
                            &profile,
                            Some(&slot),
                            settings,
                            now,
                        )?;
                        tx.bump_offering_stats(offering.id, 1, 1)?;

                        outbox.notify(booking_notification(
                            &booking,
                            booking.consumer_id,
                            NotificationType::BookingAccepted,
                            "Booking confirmed",
                            format!("Your session \"{}\" is booked.", offering.title),
                        ));
                        outbox.notify(booking_notification(
                            &booking,
                            booking.instructor_id,
                            NotificationType::SessionScheduled,
                            "New session scheduled",
                            format!("A session of \"{}\" was booked.", offering.title),
                        ));
                        Some(session)
                    }
                    _ => {
                        outbox.notify(booking_notification(
                            &booking,
                            booking.instructor_id,
                            NotificationType::BookingRequested,
                            "New booking request",
                            format!("A student asked to book \"{}\".", offering.title),
                        ));
                        None
                    }
                };

                Ok((BookingDetailsModel { booking, session }, outbox))
            })
            .inspect_err(|err| {
                warn!(%consumer_id, offering_id = %model.offering_id, error = %err, "bookings: create rejected");
            })?;

        info!(
            booking_id = %details.booking.id,
            %consumer_id,
            status = %details.booking.status,
            "bookings: request created"
        );
        self.effects.flush(outbox).await;
        Ok(details)
    }

    pub fn get(&self, actor_id: Uuid, booking_id: Uuid) -> BookingResult<BookingDetailsModel> {
        let (booking, session) = self.store.run_in_transaction(|tx| {
            let booking = tx
                .find_booking(booking_id)?
                .ok_or_else(|| BookingError::not_found("booking_request", booking_id))?;
            let session = tx.find_session_by_booking(booking_id)?;
            Ok((booking, session))
        })?;

        if !booking.involves(actor_id) {
            return Err(BookingError::Forbidden(
                "booking belongs to other users".to_string(),
            ));
        }
        Ok(BookingDetailsModel { booking, session })
    }

    /// Accepts a PENDING request, re-validating capacity against the live counter.
    pub async fn accept(
        &self,
        instructor_id: Uuid,
        booking_id: Uuid,
        model: AcceptBookingModel,
        now: DateTime<Utc>,
    ) -> BookingResult<BookingDetailsModel> {
        let settings = self.settings;

        let (decided, outbox) = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let mut booking = load_booking_for_update(tx, booking_id)?;
            if booking.instructor_id != instructor_id {
                return Err(BookingError::Forbidden(
                    "only the booking's instructor can accept it".to_string(),
                ));
            }
            let from = booking.status()?;
            let to = from.apply(BookingEvent::Accept)?;
            if lapse_if_expired(tx, &mut booking, now, &mut outbox)? {
                return Ok((Decided::Lapsed, outbox));
            }

            let offering = load_offering(tx, booking.offering_id)?;
            let profile = tx
                .find_instructor_profile(instructor_id)?
                .ok_or_else(|| BookingError::not_found("instructor_profile", instructor_id))?;

            let slot_id = model.slot_id.or(booking.slot_id);
            let slot = match slot_id {
                Some(slot_id) => {
                    let slot = capacity_ledger::reserve(tx, slot_id, Some(booking.id), now)?;
                    validate_slot_for_offering(&slot, &offering, now)?;
                    Some(slot)
                }
                None => None,
            };

            if let Some(final_price) = model.final_price_minor {
                let base = base_price(tx, &offering, slot.as_ref())?;
                ensure_price_floor(final_price, base)?;
                booking.final_price_minor = Some(final_price);
            }

            booking.status = to.as_str().to_string();
            booking.slot_id = slot_id;
            booking.instructor_response = model.instructor_response.clone();
            booking.responded_at = Some(now);
            booking.updated_at = now;
            write_booking(tx, &booking, from)?;

            let session = sessions::materialize_from_booking(
                tx,
                &booking,
                &offering,
                &profile,
                slot.as_ref(),
                settings,
                now,
            )?;
            tx.bump_offering_stats(offering.id, 1, 1)?;

            outbox.notify(booking_notification(
                &booking,
                booking.consumer_id,
                NotificationType::BookingAccepted,
                "Booking accepted",
                format!("Your request for \"{}\" was accepted.", offering.title),
            ));

            Ok((
                Decided::Applied(BookingDetailsModel {
                    booking,
                    session: Some(session),
                }),
                outbox,
            ))
        })?;

        self.effects.flush(outbox).await;
        match decided {
            Decided::Applied(details) => {
                info!(%booking_id, %instructor_id, "bookings: request accepted");
                Ok(details)
            }
            Decided::Lapsed => Err(BookingError::invalid_transition(
                "booking_request",
                BookingStatus::Expired,
                BookingEvent::Accept,
            )),
        }
    }

    pub async fn reject(
        &self,
        instructor_id: Uuid,
        booking_id: Uuid,
        model: RejectBookingModel,
        now: DateTime<Utc>,
    ) -> BookingResult<BookingRequestEntity> {
        let (decided, outbox) = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let mut booking = load_booking_for_update(tx, booking_id)?;
            if booking.instructor_id != instructor_id {
                return Err(BookingError::Forbidden(
                    "only the booking's instructor can reject it".to_string(),
                ));
            }
            let from = booking.status()?;
            let to = from.apply(BookingEvent::Reject)?;
            if lapse_if_expired(tx, &mut booking, now, &mut outbox)? {
                return Ok((Decided::Lapsed, outbox));
            }

            booking.status = to.as_str().to_string();
            booking.instructor_response = model.reason.clone();
            booking.responded_at = Some(now);
            booking.updated_at = now;
            write_booking(tx, &booking, from)?;

            outbox.notify(booking_notification(
                &booking,
                booking.consumer_id,
                NotificationType::BookingRejected,
                "Booking declined",
                model
                    .reason
                    .clone()
                    .unwrap_or_else(|| "The instructor declined your request.".to_string()),
            ));
            Ok((Decided::Applied(booking), outbox))
        })?;

        self.effects.flush(outbox).await;
        match decided {
            Decided::Applied(booking) => {
                info!(%booking_id, %instructor_id, "bookings: request rejected");
                Ok(booking)
            }
            Decided::Lapsed => Err(BookingError::invalid_transition(
                "booking_request",
                BookingStatus::Expired,
                BookingEvent::Reject,
            )),
        }
    }

    /// Cancels a PENDING or ACCEPTED booking by either party. An accepted booking takes
    /// its session down with it and gives the slot place back.
    pub async fn cancel(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        model: CancelBookingModel,
        now: DateTime<Utc>,
    ) -> BookingResult<BookingDetailsModel> {
        let (details, outbox) = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let booking = load_booking_for_update(tx, booking_id)?;
            if !booking.involves(actor_id) {
                return Err(BookingError::Forbidden(
                    "booking belongs to other users".to_string(),
                ));
            }
            let from = booking.status()?;
            from.apply(BookingEvent::Cancel)?;

            let session = match tx.find_session_by_booking(booking_id)? {
                Some(session) if !session.status()?.is_terminal() => {
                    Some(sessions::cancel_session_row(
                        tx,
                        session,
                        Some(actor_id),
                        model.reason.clone(),
                        now,
                        &mut outbox,
                    )?)
                }
                other => other,
            };
            // The session released the slot place if it held one.
            let slot_released = session
                .as_ref()
                .is_some_and(|session| session.slot_id.is_some());

            let booking = cancel_booking_row(
                tx,
                booking,
                session.as_ref(),
                actor_id,
                model.reason.clone(),
                slot_released,
                now,
                &mut outbox,
            )?;
            Ok((BookingDetailsModel { booking, session }, outbox))
        })?;

        info!(%booking_id, %actor_id, "bookings: booking cancelled");
        self.effects.flush(outbox).await;
        Ok(details)
    }

    /// Moves an ACCEPTED booking and its session to another slot.
    pub async fn reschedule(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        model: RescheduleBookingModel,
        now: DateTime<Utc>,
    ) -> BookingResult<BookingDetailsModel> {
        let max_reschedules = self.settings.max_reschedules;

        let (details, outbox) = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let mut booking = load_booking_for_update(tx, booking_id)?;
            if !booking.involves(actor_id) {
                return Err(BookingError::Forbidden(
                    "booking belongs to other users".to_string(),
                ));
            }
            let from = booking.status()?;
            let to = from.apply(BookingEvent::Reschedule)?;
            if booking.reschedule_count >= max_reschedules {
                return Err(BookingError::PolicyViolation(format!(
                    "booking was already rescheduled {} times",
                    booking.reschedule_count
                )));
            }
            if booking.slot_id == Some(model.new_slot_id) {
                return Err(BookingError::BadRequest(
                    "booking is already on that slot".to_string(),
                ));
            }

            let offering = load_offering(tx, booking.offering_id)?;
            let new_slot = capacity_ledger::inspect(tx, model.new_slot_id, Some(booking.id))?.slot;
            validate_slot_for_offering(&new_slot, &offering, now)?;

            let session = match tx.find_session_by_booking(booking_id)? {
                Some(session) => Some(sessions::move_session(
                    tx,
                    session,
                    new_slot.start_at,
                    Some(new_slot.id),
                    now,
                )?),
                None => {
                    capacity_ledger::reserve(tx, new_slot.id, Some(booking.id), now)?;
                    if let Some(old_slot) = booking.slot_id {
                        capacity_ledger::release(tx, old_slot, now)?;
                    }
                    None
                }
            };

            booking.status = to.as_str().to_string();
            booking.slot_id = Some(new_slot.id);
            booking.reschedule_count += 1;
            booking.updated_at = now;
            write_booking(tx, &booking, from)?;

            let counterpart = if actor_id == booking.consumer_id {
                booking.instructor_id
            } else {
                booking.consumer_id
            };
            outbox.notify(booking_notification(
                &booking,
                counterpart,
                NotificationType::BookingRescheduled,
                "Booking rescheduled",
                model.reason.clone().unwrap_or_else(|| {
                    format!("The session now starts at {}.", new_slot.start_at.to_rfc3339())
                }),
            ));

            Ok((BookingDetailsModel { booking, session }, outbox))
        })?;

        info!(
            %booking_id,
            reschedule_count = details.booking.reschedule_count,
            "bookings: booking rescheduled"
        );
        self.effects.flush(outbox).await;
        Ok(details)
    }

    pub fn list(
        &self,
        actor_id: Uuid,
        role: BookingRole,
        mut filter: BookingListFilter,
    ) -> BookingResult<Vec<BookingRequestEntity>> {
        match role {
            BookingRole::Consumer => filter.consumer_id = Some(actor_id),
            BookingRole::Instructor => filter.instructor_id = Some(actor_id),
        }
        filter.limit = Some(clamp_limit(filter.limit));

        self.store
            .run_in_transaction(|tx| Ok(tx.list_bookings(&filter)?))
            .inspect_err(|err| {
                error!(%actor_id, db_error = ?err, "bookings: failed to list bookings");
            })
    }

    pub fn stats(&self, actor_id: Uuid, role: BookingRole) -> BookingResult<BookingStatsModel> {
        let filter = match role {
            BookingRole::Consumer => BookingListFilter {
                consumer_id: Some(actor_id),
                ..Default::default()
            },
            BookingRole::Instructor => BookingListFilter {
                instructor_id: Some(actor_id),
                ..Default::default()
            },
        };

        let bookings = self
            .store
            .run_in_transaction(|tx| Ok(tx.list_bookings(&filter)?))?;
        Ok(BookingStatsModel::from_bookings(&bookings))
    }

    /// Expires overdue PENDING requests, one transaction per row.
    pub async fn expire_overdue(
        &self,
        now: DateTime<Utc>,
        batch_size: i64,
    ) -> BookingResult<ExpirySweepReport> {
        let ids = self
            .store
            .run_in_transaction(|tx| Ok(tx.list_expired_pending_ids(now, batch_size)?))?;

        let mut report = ExpirySweepReport {
            scanned: ids.len(),
            ..Default::default()
        };

        for booking_id in ids {
            let result = self.store.run_in_transaction(|tx| {
                let mut outbox = Outbox::new();
                let Some(mut booking) = tx.find_booking_for_update(booking_id)? else {
                    return Ok(None);
                };
                if lapse_if_expired(tx, &mut booking, now, &mut outbox)? {
                    Ok(Some(outbox))
                } else {
                    Ok(None)
                }
            });

            match result {
                Ok(Some(outbox)) => {
                    report.expired += 1;
                    self.effects.flush(outbox).await;
                }
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    error!(%booking_id, error = ?err, "bookings: failed to expire request");
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                failed = report.failed,
                "bookings: expiry sweep finished"
            );
        }
        Ok(report)
    }

    pub fn refund_quote(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<RefundQuoteModel> {
        self.store.run_in_transaction(|tx| {
            let booking = tx
                .find_booking(booking_id)?
                .ok_or_else(|| BookingError::not_found("booking_request", booking_id))?;
            if !booking.involves(actor_id) {
                return Err(BookingError::Forbidden(
                    "booking belongs to other users".to_string(),
                ));
            }
            if booking.payment_status()? != PaymentStatus::Paid {
                return Err(BookingError::BadRequest(format!(
                    "booking {booking_id} is not paid"
                )));
            }

            let session = tx.find_session_by_booking(booking_id)?;
            let policy = cancellation_policy(tx, &booking, session.as_ref())?;
            let start_at = scheduled_start(tx, &booking, session.as_ref())?;
            let hours_until_start = (start_at - now).num_seconds() as f64 / 3600.0;
            let original_amount_minor =
                booking.effective_price_minor() - booking.refunded_amount_minor;

            Ok(RefundQuoteModel {
                booking_id,
                policy,
                hours_until_start,
                original_amount_minor,
                refund_percent: refund_calculator::refund_percent(policy, hours_until_start),
                refund_amount_minor: refund_calculator::refund_amount(
                    original_amount_minor,
                    policy,
                    hours_until_start,
                ),
            })
        })
    }

    /// Opens a manual-capture payment intent for an accepted booking.
    pub async fn start_payment(
        &self,
        consumer_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> BookingResult<PaymentIntentModel> {
        fn ensure_payable(booking: &BookingRequestEntity) -> BookingResult<()> {
            let status = booking.status()?;
            if status != BookingStatus::Accepted {
                return Err(BookingError::invalid_transition(
                    "booking_request",
                    status,
                    "pay",
                ));
            }
            let payment_status = booking.payment_status()?;
            if !matches!(payment_status, PaymentStatus::Unpaid | PaymentStatus::Failed) {
                return Err(BookingError::Conflict(format!(
                    "payment is already {payment_status}"
                )));
            }
            Ok(())
        }

        let booking = self.store.run_in_transaction(|tx| {
            let booking = tx
                .find_booking(booking_id)?
                .ok_or_else(|| BookingError::not_found("booking_request", booking_id))?;
            if booking.consumer_id != consumer_id {
                return Err(BookingError::Forbidden(
                    "only the consumer can pay for a booking".to_string(),
                ));
            }
            ensure_payable(&booking)?;
            Ok(booking)
        })?;

        let request = IntentRequest {
            booking_id,
            amount_minor: booking.effective_price_minor(),
            currency: booking.currency.clone(),
            previous_intent_ref: booking.payment_intent_ref.clone(),
        };
        let intent = self
            .effects
            .payments()
            .create_intent(request)
            .await
            .map_err(|err| {
                error!(%booking_id, error = ?err, "bookings: failed to create payment intent");
                BookingError::external("payment_gateway", err)
            })?;

        self.store.run_in_transaction(|tx| {
            let mut booking = load_booking_for_update(tx, booking_id)?;
            ensure_payable(&booking)?;

            booking.payment_status = PaymentStatus::Pending.as_str().to_string();
            booking.payment_intent_ref = Some(intent.intent_ref.clone());
            booking.updated_at = now;
            write_booking(tx, &booking, BookingStatus::Accepted)?;

            if let Some(mut session) = tx.find_session_by_booking(booking_id)? {
                let status = session.status()?;
                session.payment_intent_ref = Some(intent.intent_ref.clone());
                session.updated_at = now;
                sessions::write_session(tx, &session, status)?;
            }
            Ok(())
        })?;

        info!(%booking_id, intent_ref = %intent.intent_ref, "bookings: payment started");
        Ok(intent)
    }

    /// Applies a verified payment gateway event to the booking holding the intent.
    pub async fn handle_payment_event(
        &self,
        event: PaymentEvent,
        now: DateTime<Utc>,
    ) -> BookingResult<PaymentEventOutcome> {
        let (intent_ref, authorized, failure_reason) = match event {
            PaymentEvent::Ignored { event_type } => {
                info!(%event_type, "bookings: payment event ignored");
                return Ok(PaymentEventOutcome {
                    booking_id: None,
                    handled: false,
                });
            }
            PaymentEvent::Authorized { intent_ref } => (intent_ref, true, None),
            PaymentEvent::Failed { intent_ref, reason } => (intent_ref, false, reason),
        };

        let (outcome, outbox) = self.store.run_in_transaction(|tx| {
            let mut outbox = Outbox::new();
            let Some(found) = tx.find_booking_by_payment_intent(&intent_ref)? else {
                warn!(%intent_ref, "bookings: payment event for unknown intent");
                return Ok((
                    PaymentEventOutcome {
                        booking_id: None,
                        handled: false,
                    },
                    outbox,
                ));
            };
            let mut booking = load_booking_for_update(tx, found.id)?;
            let status = booking.status()?;
            let payment_status = booking.payment_status()?;

            let next = match (authorized, payment_status) {
                (true, PaymentStatus::Unpaid | PaymentStatus::Pending | PaymentStatus::Failed) => {
                    PaymentStatus::Paid
                }
                (false, PaymentStatus::Unpaid | PaymentStatus::Pending) => PaymentStatus::Failed,
                _ => {
                    info!(
                        booking_id = %booking.id,
                        %payment_status,
                        "bookings: payment event already applied"
                    );
                    return Ok((
                        PaymentEventOutcome {
                            booking_id: Some(booking.id),
                            handled: true,
                        },
                        outbox,
                    ));
                }
            };

            booking.payment_status = next.as_str().to_string();
            booking.updated_at = now;

            if next == PaymentStatus::Paid && status != BookingStatus::Accepted {
                warn!(
                    booking_id = %booking.id,
                    %status,
                    "bookings: payment authorized for a closed booking, refunding"
                );
                let amount_minor = booking.effective_price_minor() - booking.refunded_amount_minor;
                if amount_minor > 0 {
                    outbox.push(Effect::Refund {
                        booking_id: booking.id,
                        intent_ref: intent_ref.clone(),
                        amount_minor,
                        reason: format!("booking {status}"),
                    });
                }
            }
            if next == PaymentStatus::Failed {
                warn!(
                    booking_id = %booking.id,
                    reason = ?failure_reason,
                    "bookings: payment failed"
                );
            }

            write_booking(tx, &booking, status)?;
            Ok((
                PaymentEventOutcome {
                    booking_id: Some(booking.id),
                    handled: true,
                },
                outbox,
            ))
        })?;

        info!(
            %intent_ref,
            booking_id = ?outcome.booking_id,
            authorized,
            "bookings: payment event applied"
        );
        self.effects.flush(outbox).await;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use crates::{
        domain::{
            repositories::{
                notification_dispatcher::MockNotificationDispatcher,
                payment_gateway::MockPaymentGateway, video_provider::MockVideoProvider,
            },
            value_objects::{
                enums::session_statuses::SessionStatus,
                payments::RefundOutcome,
            },
        },
        infra::memory::booking_store::InMemoryBookingStore,
    };

    use super::*;
    use crate::usecases::test_support::{Fixture, quiet_notifier, runner};

    type TestBookings = BookingUseCase<
        InMemoryBookingStore,
        MockPaymentGateway,
        MockVideoProvider,
        MockNotificationDispatcher,
    >;

    fn usecase(fixture: &Fixture, payments: MockPaymentGateway) -> TestBookings {
        BookingUseCase::new(
            runner(fixture, payments, MockVideoProvider::new(), quiet_notifier()),
            BookingSettings::default(),
        )
    }

    fn direct(fixture: &Fixture, slot_id: Uuid) -> CreateBookingModel {
        CreateBookingModel {
            offering_id: fixture.offering.id,
            slot_id: Some(slot_id),
            mode: BookingMode::Direct,
            requested_start_at: None,
            offered_price_minor: None,
            consumer_message: None,
        }
    }

    #[tokio::test]
    async fn request_mode_waits_for_the_instructor_even_with_auto_accept() {
        let fixture = Fixture::new();
        let slot = fixture.slot(1, 48);
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let details = bookings
            .create(
                fixture.consumer_id,
                CreateBookingModel {
                    mode: BookingMode::Request,
                    ..direct(&fixture, slot.id)
                },
                fixture.now,
            )
            .await
            .unwrap();

        assert_eq!(details.booking.status, BookingStatus::Pending.as_str());
        assert!(details.session.is_none());
        let stored = fixture.slot_row(slot.id);
        assert_eq!(stored.current_bookings, 0);
        assert!(!stored.is_booked);
    }

    #[tokio::test]
    async fn auto_approved_booking_takes_the_slot_and_schedules_a_session() {
        let fixture = Fixture::new();
        let slot = fixture.slot(1, 48);
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let details = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();

        assert_eq!(details.booking.status, BookingStatus::Accepted.as_str());
        let session = details.session.unwrap();
        assert_eq!(session.status, SessionStatus::Scheduled.as_str());
        assert_eq!(session.slot_id, Some(slot.id));
        assert_eq!(session.current_participants, 1);

        let stored = fixture.slot_row(slot.id);
        assert_eq!(stored.current_bookings, 1);
        assert!(stored.is_booked);
    }

    #[tokio::test]
    async fn expiry_is_capped_at_the_slot_start() {
        let fixture = Fixture::with_auto_accept(false);
        let slot = fixture.slot(1, 6);
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let details = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();

        assert_eq!(details.booking.status, BookingStatus::Pending.as_str());
        assert_eq!(details.booking.expires_at, slot.start_at);
        assert_eq!(fixture.slot_row(slot.id).current_bookings, 0);
    }

    #[tokio::test]
    async fn offer_below_half_the_base_price_is_a_policy_violation() {
        let fixture = Fixture::new();
        let slot = fixture.slot(1, 48);
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let mut model = direct(&fixture, slot.id);
        model.offered_price_minor = Some(4_000);
        let err = bookings
            .create(fixture.consumer_id, model, fixture.now)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::PolicyViolation(_)));
        assert_eq!(fixture.slot_row(slot.id).current_bookings, 0);
    }

    #[tokio::test]
    async fn second_outstanding_request_for_the_same_offering_conflicts() {
        let fixture = Fixture::with_auto_accept(false);
        let bookings = usecase(&fixture, MockPaymentGateway::new());
        let first = fixture.slot(2, 48);
        let second = fixture.slot(2, 72);

        bookings
            .create(fixture.consumer_id, direct(&fixture, first.id), fixture.now)
            .await
            .unwrap();
        let err = bookings
            .create(fixture.consumer_id, direct(&fixture, second.id), fixture.now)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_direct_bookings_never_oversell_a_slot() {
        let fixture = Fixture::new();
        let slot = fixture.slot(1, 48);
        let bookings = Arc::new(usecase(&fixture, MockPaymentGateway::new()));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let bookings = Arc::clone(&bookings);
            let consumer_id = fixture.add_consumer();
            let model = direct(&fixture, slot.id);
            let now = fixture.now;
            handles.push(tokio::spawn(async move {
                bookings.create(consumer_id, model, now).await
            }));
        }

        let mut accepted = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(details) => {
                    assert_eq!(details.booking.status, BookingStatus::Accepted.as_str());
                    accepted += 1;
                }
                Err(BookingError::CapacityExceeded(_)) => rejected += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!((accepted, rejected), (1, 1));
        let stored = fixture.slot_row(slot.id);
        assert_eq!(stored.current_bookings, 1);
        assert!(stored.current_bookings <= stored.max_bookings);
    }

    #[tokio::test]
    async fn pending_holds_count_against_capacity_until_accepted() {
        let fixture = Fixture::with_auto_accept(false);
        let slot = fixture.slot(1, 48);
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let pending = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();
        let err = bookings
            .create(fixture.add_consumer(), direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::CapacityExceeded(_)));

        let accepted = bookings
            .accept(
                fixture.instructor_id,
                pending.booking.id,
                AcceptBookingModel::default(),
                fixture.now,
            )
            .await
            .unwrap();
        assert_eq!(accepted.booking.status, BookingStatus::Accepted.as_str());
        assert!(accepted.session.is_some());
        assert_eq!(fixture.slot_row(slot.id).current_bookings, 1);
    }

    #[tokio::test]
    async fn accepting_a_lapsed_request_expires_it() {
        let fixture = Fixture::with_auto_accept(false);
        let slot = fixture.slot(1, 100);
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let pending = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();
        let later = fixture.now + Duration::hours(49);

        let err = bookings
            .accept(
                fixture.instructor_id,
                pending.booking.id,
                AcceptBookingModel::default(),
                later,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::InvalidTransition { .. }));
        assert_eq!(
            fixture.booking(pending.booking.id).status,
            BookingStatus::Expired.as_str()
        );
    }

    #[tokio::test]
    async fn only_the_instructor_may_accept() {
        let fixture = Fixture::with_auto_accept(false);
        let slot = fixture.slot(1, 48);
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let pending = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();
        let err = bookings
            .accept(
                fixture.consumer_id,
                pending.booking.id,
                AcceptBookingModel::default(),
                fixture.now,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Forbidden(_)));
    }

    #[tokio::test]
    async fn expiry_sweep_is_idempotent() {
        let fixture = Fixture::with_auto_accept(false);
        let slot = fixture.slot(3, 100);
        let bookings = usecase(&fixture, MockPaymentGateway::new());
        for _ in 0..2 {
            bookings
                .create(fixture.add_consumer(), direct(&fixture, slot.id), fixture.now)
                .await
                .unwrap();
        }
        let later = fixture.now + Duration::hours(49);

        let first = bookings.expire_overdue(later, 200).await.unwrap();
        let second = bookings.expire_overdue(later, 200).await.unwrap();

        assert_eq!(first.expired, 2);
        assert_eq!(first.failed, 0);
        assert_eq!(second, ExpirySweepReport::default());
    }

    #[tokio::test]
    async fn cancelling_a_paid_booking_cascades_and_refunds() {
        let fixture = Fixture::new();
        let slot = fixture.slot(1, 30);

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_refund()
            .withf(|intent_ref, amount, _| intent_ref == "pi_1" && *amount == 10_000)
            .times(1)
            .returning(|_, amount, _| {
                Box::pin(async move {
                    Ok(RefundOutcome {
                        refund_id: "re_1".to_string(),
                        amount_minor: amount,
                    })
                })
            });
        let bookings = usecase(&fixture, payments);

        let details = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();
        let booking_id = details.booking.id;
        fixture
            .store
            .run_in_transaction(|tx| {
                let mut booking = tx.find_booking_for_update(booking_id)?.unwrap();
                booking.payment_status = PaymentStatus::Paid.as_str().to_string();
                booking.payment_intent_ref = Some("pi_1".to_string());
                tx.update_booking(&booking, BookingStatus::Accepted)?;
                Ok(())
            })
            .unwrap();

        let cancelled = bookings
            .cancel(
                fixture.consumer_id,
                booking_id,
                CancelBookingModel {
                    reason: Some("plans changed".to_string()),
                },
                fixture.now,
            )
            .await
            .unwrap();

        assert_eq!(cancelled.booking.status, BookingStatus::Cancelled.as_str());
        assert_eq!(
            cancelled.session.unwrap().status,
            SessionStatus::Cancelled.as_str()
        );
        assert_eq!(fixture.slot_row(slot.id).current_bookings, 0);

        let stored = fixture.booking(booking_id);
        assert_eq!(stored.payment_status, PaymentStatus::Refunded.as_str());
        assert_eq!(stored.refunded_amount_minor, 10_000);
    }

    #[tokio::test]
    async fn reschedules_stop_at_the_cap() {
        let fixture = Fixture::new();
        let slots: Vec<_> = (0..5).map(|i| fixture.slot(1, 48 + i * 3)).collect();
        let bookings = usecase(&fixture, MockPaymentGateway::new());

        let details = bookings
            .create(fixture.consumer_id, direct(&fixture, slots[0].id), fixture.now)
            .await
            .unwrap();

        for slot in &slots[1..4] {
            bookings
                .reschedule(
                    fixture.consumer_id,
                    details.booking.id,
                    RescheduleBookingModel {
                        new_slot_id: slot.id,
                        reason: None,
                    },
                    fixture.now,
                )
                .await
                .unwrap();
        }

        let err = bookings
            .reschedule(
                fixture.consumer_id,
                details.booking.id,
                RescheduleBookingModel {
                    new_slot_id: slots[4].id,
                    reason: None,
                },
                fixture.now,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::PolicyViolation(_)));
        assert_eq!(fixture.slot_row(slots[0].id).current_bookings, 0);
        assert_eq!(fixture.slot_row(slots[3].id).current_bookings, 1);
        let session = fixture
            .store
            .run_in_transaction(|tx| Ok(tx.find_session_by_booking(details.booking.id)?))
            .unwrap()
            .unwrap();
        assert_eq!(session.slot_id, Some(slots[3].id));
        assert_eq!(session.scheduled_start_at, slots[3].start_at);
    }

    #[tokio::test]
    async fn authorization_marks_the_booking_paid_once() {
        let fixture = Fixture::new();
        let slot = fixture.slot(1, 48);

        let mut payments = MockPaymentGateway::new();
        payments.expect_create_intent().times(1).returning(|request| {
            Box::pin(async move {
                Ok(PaymentIntentModel {
                    intent_ref: "pi_7".to_string(),
                    client_secret: Some("secret".to_string()),
                    amount_minor: request.amount_minor,
                    currency: request.currency,
                })
            })
        });
        let bookings = usecase(&fixture, payments);

        let details = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();
        let intent = bookings
            .start_payment(fixture.consumer_id, details.booking.id, fixture.now)
            .await
            .unwrap();
        assert_eq!(intent.amount_minor, 10_000);

        let event = PaymentEvent::Authorized {
            intent_ref: "pi_7".to_string(),
        };
        let outcome = bookings
            .handle_payment_event(event.clone(), fixture.now)
            .await
            .unwrap();
        assert!(outcome.handled);
        assert_eq!(
            fixture.booking(details.booking.id).payment_status,
            PaymentStatus::Paid.as_str()
        );

        let replay = bookings.handle_payment_event(event, fixture.now).await.unwrap();
        assert_eq!(replay.booking_id, Some(details.booking.id));

        let err = bookings
            .start_payment(fixture.consumer_id, details.booking.id, fixture.now)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict(_)));
    }

    #[tokio::test]
    async fn payment_restarts_with_a_fresh_attempt_after_failure() {
        let fixture = Fixture::new();
        let slot = fixture.slot(1, 48);

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_create_intent()
            .withf(|request| request.previous_intent_ref.is_none())
            .times(1)
            .returning(|request| {
                Box::pin(async move {
                    Ok(PaymentIntentModel {
                        intent_ref: "pi_first".to_string(),
                        client_secret: None,
                        amount_minor: request.amount_minor,
                        currency: request.currency,
                    })
                })
            });
        payments
            .expect_create_intent()
            .withf(|request| request.previous_intent_ref.as_deref() == Some("pi_first"))
            .times(1)
            .returning(|request| {
                Box::pin(async move {
                    Ok(PaymentIntentModel {
                        intent_ref: "pi_second".to_string(),
                        client_secret: None,
                        amount_minor: request.amount_minor,
                        currency: request.currency,
                    })
                })
            });
        let bookings = usecase(&fixture, payments);

        let details = bookings
            .create(fixture.consumer_id, direct(&fixture, slot.id), fixture.now)
            .await
            .unwrap();
        bookings
            .start_payment(fixture.consumer_id, details.booking.id, fixture.now)
            .await
            .unwrap();
        bookings
            .handle_payment_event(
                PaymentEvent::Failed {
                    intent_ref: "pi_first".to_string(),
                    reason: Some("card_declined".to_string()),
                },
                fixture.now,
            )
            .await
            .unwrap();

        let retry = bookings
            .start_payment(fixture.consumer_id, details.booking.id, fixture.now)
            .await
            .unwrap();

        assert_eq!(retry.intent_ref, "pi_second");
        let stored = fixture.booking(details.booking.id);
        assert_eq!(stored.payment_status, PaymentStatus::Pending.as_str());
        assert_eq!(stored.payment_intent_ref.as_deref(), Some("pi_second"));
    }
}
