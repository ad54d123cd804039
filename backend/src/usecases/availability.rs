use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use crates::domain::{
    entities::{availabilities::AvailabilityEntity, time_slots::TimeSlotEntity},
    errors::{BookingError, BookingResult},
    repositories::booking_store::{BookingStore, StoreTx},
    scheduling::slot_generator,
    value_objects::availability::{
        AvailabilityWindowModel, AvailabilityWithSlotsModel, ConflictCheckModel, ConflictReport,
        CreateAvailabilityModel, GenerateAvailabilityRangeModel, GeneratedRangeModel,
        SlotRangeQuery, UpdateAvailabilityModel,
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct AvailabilityUseCase<S>
where
    S: BookingStore,
{
    store: Arc<S>,
}

fn load_owned(
    tx: &mut dyn StoreTx,
    instructor_id: Uuid,
    availability_id: Uuid,
) -> BookingResult<AvailabilityEntity> {
    let availability = tx
        .find_availability(availability_id)?
        .ok_or_else(|| BookingError::not_found("instructor_availability", availability_id))?;
    if availability.instructor_id != instructor_id {
        return Err(BookingError::Forbidden(
            "availability belongs to another instructor".to_string(),
        ));
    }
    Ok(availability)
}

fn ensure_no_overlap(
    tx: &mut dyn StoreTx,
    candidate: &AvailabilityEntity,
) -> BookingResult<()> {
    let overlapping = tx
        .list_availabilities_between(candidate.instructor_id, candidate.date, candidate.date)?
        .into_iter()
        .find(|existing| {
            existing.id != candidate.id
                && existing.overlaps(candidate.date, candidate.start_time, candidate.end_time)
        });

    match overlapping {
        Some(existing) => Err(BookingError::Conflict(format!(
            "window overlaps availability {} on {}",
            existing.id, existing.date
        ))),
        None => Ok(()),
    }
}

fn generate(availability: &AvailabilityEntity, now: DateTime<Utc>) -> BookingResult<Vec<TimeSlotEntity>> {
    let slots = slot_generator::slots_for_availability(availability, now)?;
    if slots.is_empty() {
        return Err(BookingError::BadRequest(
            "window is shorter than one slot".to_string(),
        ));
    }
    Ok(slots)
}

/// Inserts a validated window and its slots.
fn insert_window(
    tx: &mut dyn StoreTx,
    availability: AvailabilityEntity,
    now: DateTime<Utc>,
) -> BookingResult<AvailabilityWithSlotsModel> {
    ensure_no_overlap(tx, &availability)?;
    let slots = generate(&availability, now)?;

    tx.insert_availability(&availability)?;
    tx.insert_slots(&slots)?;

    Ok(AvailabilityWithSlotsModel {
        availability,
        slots,
    })
}

fn ensure_instructor(tx: &mut dyn StoreTx, instructor_id: Uuid) -> BookingResult<()> {
    tx.find_instructor_profile(instructor_id)?
        .ok_or_else(|| BookingError::not_found("instructor_profile", instructor_id))?;
    Ok(())
}

impl<S> AvailabilityUseCase<S>
where
    S: BookingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        instructor_id: Uuid,
        model: CreateAvailabilityModel,
        now: DateTime<Utc>,
    ) -> BookingResult<AvailabilityWithSlotsModel> {
        model.window.validate()?;
        slot_generator::parse_timezone(&model.window.timezone)?;

        let created = self
            .store
            .run_in_transaction(|tx| {
                ensure_instructor(tx, instructor_id)?;
                let availability = model.window.to_entity(instructor_id, model.date, now);
                insert_window(tx, availability, now)
            })
            .inspect_err(|err| {
                warn!(%instructor_id, date = %model.date, error = %err, "availability: create rejected");
            })?;

        info!(
            %instructor_id,
            availability_id = %created.availability.id,
            slot_count = created.slots.len(),
            "availability: window created"
        );
        Ok(created)
    }

    /// Applies an edit. Slot geometry changes delete and regenerate every slot, which is
    /// refused while any slot is referenced by a booking or session. Toggling `is_active`
    /// alone keeps the slots and flips their availability.
    pub fn update(
        &self,
        instructor_id: Uuid,
        availability_id: Uuid,
        model: UpdateAvailabilityModel,
        now: DateTime<Utc>,
    ) -> BookingResult<AvailabilityWithSlotsModel> {
        let updated = self.store.run_in_transaction(|tx| {
            let mut availability = load_owned(tx, instructor_id, availability_id)?;
            let was_active = availability.is_active;

            let geometry_changed = model.apply_to(&mut availability);
            AvailabilityWindowModel::from(&availability).validate()?;
            slot_generator::parse_timezone(&availability.timezone)?;
            availability.updated_at = now;

            let slots = if geometry_changed {
                if tx.availability_has_references(availability_id)? {
                    return Err(BookingError::Conflict(format!(
                        "availability {availability_id} has booked slots and cannot be reshaped"
                    )));
                }
                ensure_no_overlap(tx, &availability)?;

                let slots = generate(&availability, now)?;
                let removed = tx.delete_slots_for_availability(availability_id)?;
                tx.insert_slots(&slots)?;
                info!(%availability_id, removed, created = slots.len(), "availability: slots regenerated");
                slots
            } else {
                if was_active != availability.is_active {
                    let changed = tx.set_availability_slots_available(
                        availability_id,
                        availability.is_active,
                        now,
                    )?;
                    info!(
                        %availability_id,
                        active = availability.is_active,
                        changed,
                        "availability: slot availability toggled"
                    );
                }
                tx.list_slots_for_availability(availability_id)?
            };

            tx.update_availability(&availability)?;
            Ok(AvailabilityWithSlotsModel {
                availability,
                slots,
            })
        })?;

        info!(%instructor_id, %availability_id, "availability: window updated");
        Ok(updated)
    }

    pub fn delete(
        &self,
        instructor_id: Uuid,
        availability_id: Uuid,
    ) -> BookingResult<()> {
        self.store.run_in_transaction(|tx| {
            load_owned(tx, instructor_id, availability_id)?;
            if tx.availability_has_references(availability_id)? {
                return Err(BookingError::Conflict(format!(
                    "availability {availability_id} has booked slots"
                )));
            }
            tx.delete_slots_for_availability(availability_id)?;
            tx.delete_availability(availability_id)?;
            Ok(())
        })?;

        info!(%instructor_id, %availability_id, "availability: window deleted");
        Ok(())
    }

    /// Creates one window per matching date in a single transaction. Dates that already
    /// carry an overlapping window are reported instead of failing the whole range.
    pub fn generate_range(
        &self,
        instructor_id: Uuid,
        model: GenerateAvailabilityRangeModel,
        now: DateTime<Utc>,
    ) -> BookingResult<GeneratedRangeModel> {
        model.window.validate()?;
        slot_generator::parse_timezone(&model.window.timezone)?;
        let dates = model.dates()?;

        let generated = self.store.run_in_transaction(|tx| {
            ensure_instructor(tx, instructor_id)?;
            let mut created = Vec::new();
            let mut skipped_dates: Vec<NaiveDate> = Vec::new();

            for date in dates {
                let availability = model.window.to_entity(instructor_id, date, now);
                match insert_window(tx, availability, now) {
                    Ok(window) => created.push(window),
                    Err(BookingError::Conflict(_)) => skipped_dates.push(date),
                    Err(err) => return Err(err),
                }
            }

            Ok(GeneratedRangeModel {
                created,
                skipped_dates,
            })
        })?;

        info!(
            %instructor_id,
            created = generated.created.len(),
            skipped = generated.skipped_dates.len(),
            "availability: range generated"
        );
        Ok(generated)
    }

    pub fn list_slots(
        &self,
        query: SlotRangeQuery,
        now: DateTime<Utc>,
    ) -> BookingResult<Vec<TimeSlotEntity>> {
        if query.to <= query.from {
            return Err(BookingError::BadRequest(
                "range end must be after range start".to_string(),
            ));
        }

        let slots = self
            .store
            .run_in_transaction(|tx| {
                Ok(tx.list_slots_in_range(query.instructor_id, query.from, query.to)?)
            })
            .inspect_err(|err| {
                error!(instructor_id = %query.instructor_id, db_error = ?err, "availability: failed to list slots");
            })?;

        Ok(slots
            .into_iter()
            .filter(|slot| !query.only_bookable || (slot.accepts_bookings() && slot.start_at > now))
            .collect())
    }

    /// Reports the active sessions and blocked slots that intersect a proposed window.
    pub fn conflict_check(
        &self,
        instructor_id: Uuid,
        model: ConflictCheckModel,
    ) -> BookingResult<ConflictReport> {
        if model.end_at <= model.start_at {
            return Err(BookingError::BadRequest(
                "end_at must be after start_at".to_string(),
            ));
        }

        let (sessions, slots) = self.store.run_in_transaction(|tx| {
            let sessions =
                tx.list_active_sessions_overlapping(instructor_id, model.start_at, model.end_at)?;
            let slots = tx.list_slots_in_range(instructor_id, model.start_at, model.end_at)?;
            Ok((sessions, slots))
        })?;

        let session_ids: Vec<Uuid> = sessions
            .iter()
            .filter(|session| Some(session.id) != model.exclude_session_id)
            .map(|session| session.id)
            .collect();
        let blocked_slot_ids: Vec<Uuid> = slots
            .iter()
            .filter(|slot| {
                slot.is_blocked && model.start_at < slot.end_at && model.end_at > slot.start_at
            })
            .map(|slot| slot.id)
            .collect();

        Ok(ConflictReport {
            has_conflict: !session_ids.is_empty() || !blocked_slot_ids.is_empty(),
            session_ids,
            blocked_slot_ids,
        })
    }

    pub fn set_slot_blocked(
        &self,
        instructor_id: Uuid,
        slot_id: Uuid,
        blocked: bool,
        now: DateTime<Utc>,
    ) -> BookingResult<TimeSlotEntity> {
        let slot = self.store.run_in_transaction(|tx| {
            let mut slot = tx
                .find_slot_for_update(slot_id)?
                .ok_or_else(|| BookingError::not_found("time_slot", slot_id))?;
            if slot.instructor_id != instructor_id {
                return Err(BookingError::Forbidden(
                    "slot belongs to another instructor".to_string(),
                ));
            }
            tx.set_slot_blocked(slot_id, blocked, now)?;
            slot.is_blocked = blocked;
            slot.updated_at = now;
            Ok(slot)
        })?;

        info!(%instructor_id, %slot_id, blocked, "availability: slot block toggled");
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveTime};
    use crates::{
        domain::{
            scheduling::capacity_ledger,
            value_objects::enums::{
                auto_accept::AutoAcceptOverride, session_statuses::SessionStatus,
            },
        },
        infra::memory::booking_store::InMemoryBookingStore,
    };

    use super::*;
    use crate::usecases::test_support::Fixture;

    fn window(start: (u32, u32), end: (u32, u32)) -> AvailabilityWindowModel {
        AvailabilityWindowModel {
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            slot_duration_minutes: 30,
            buffer_minutes: 0,
            min_advance_hours: 0,
            max_advance_hours: 720,
            max_sessions_per_slot: 1,
            auto_accept_bookings: AutoAcceptOverride::Unset,
            price_override_minor: None,
            timezone: "UTC".to_string(),
        }
    }

    fn future_date(fixture: &Fixture) -> NaiveDate {
        (fixture.now + Duration::days(7)).date_naive()
    }

    /// Two-slot window whose first slot already hosts a scheduled session.
    fn referenced_window(
        fixture: &Fixture,
        usecase: &AvailabilityUseCase<InMemoryBookingStore>,
    ) -> AvailabilityWithSlotsModel {
        let created = usecase
            .create(
                fixture.instructor_id,
                CreateAvailabilityModel {
                    date: future_date(fixture),
                    window: window((9, 0), (10, 0)),
                },
                fixture.now,
            )
            .unwrap();

        let mut session = fixture.session_entity(SessionStatus::Scheduled, created.slots[0].start_at);
        session.slot_id = Some(created.slots[0].id);
        fixture.insert_session(&session);
        created
    }

    fn bookable(
        fixture: &Fixture,
        usecase: &AvailabilityUseCase<InMemoryBookingStore>,
    ) -> Vec<TimeSlotEntity> {
        usecase
            .list_slots(
                SlotRangeQuery {
                    instructor_id: fixture.instructor_id,
                    from: fixture.now,
                    to: fixture.now + Duration::days(8),
                    only_bookable: true,
                },
                fixture.now,
            )
            .unwrap()
    }

    #[test]
    fn create_generates_tiled_slots() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));

        let created = usecase
            .create(
                fixture.instructor_id,
                CreateAvailabilityModel {
                    date: future_date(&fixture),
                    window: window((9, 0), (10, 0)),
                },
                fixture.now,
            )
            .unwrap();

        assert_eq!(created.slots.len(), 2);
        assert_eq!(created.slots[0].end_at, created.slots[1].start_at);
        assert!(created.slots.iter().all(|slot| slot.max_bookings == 1));
    }

    #[test]
    fn overlapping_window_is_a_conflict() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let date = future_date(&fixture);

        usecase
            .create(
                fixture.instructor_id,
                CreateAvailabilityModel {
                    date,
                    window: window((9, 0), (11, 0)),
                },
                fixture.now,
            )
            .unwrap();

        let err = usecase
            .create(
                fixture.instructor_id,
                CreateAvailabilityModel {
                    date,
                    window: window((10, 30), (12, 0)),
                },
                fixture.now,
            )
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict(_)));
    }

    #[test]
    fn geometry_edit_regenerates_unreferenced_slots() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let created = usecase
            .create(
                fixture.instructor_id,
                CreateAvailabilityModel {
                    date: future_date(&fixture),
                    window: window((9, 0), (10, 0)),
                },
                fixture.now,
            )
            .unwrap();

        let updated = usecase
            .update(
                fixture.instructor_id,
                created.availability.id,
                UpdateAvailabilityModel {
                    end_time: NaiveTime::from_hms_opt(11, 0, 0),
                    ..Default::default()
                },
                fixture.now,
            )
            .unwrap();

        assert_eq!(updated.slots.len(), 4);
        assert!(
            updated
                .slots
                .iter()
                .all(|slot| created.slots.iter().all(|old| old.id != slot.id))
        );
    }

    #[test]
    fn other_instructors_cannot_edit_a_window() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let created = usecase
            .create(
                fixture.instructor_id,
                CreateAvailabilityModel {
                    date: future_date(&fixture),
                    window: window((9, 0), (10, 0)),
                },
                fixture.now,
            )
            .unwrap();

        let err = usecase
            .delete(Uuid::new_v4(), created.availability.id)
            .unwrap_err();
        assert!(matches!(err, BookingError::Forbidden(_)));
    }

    #[test]
    fn range_skips_dates_with_existing_windows() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let from = future_date(&fixture);

        usecase
            .create(
                fixture.instructor_id,
                CreateAvailabilityModel {
                    date: from,
                    window: window((9, 0), (10, 0)),
                },
                fixture.now,
            )
            .unwrap();

        let generated = usecase
            .generate_range(
                fixture.instructor_id,
                GenerateAvailabilityRangeModel {
                    from,
                    to: from + Duration::days(2),
                    weekdays: vec![],
                    window: window((9, 0), (10, 0)),
                },
                fixture.now,
            )
            .unwrap();

        assert_eq!(generated.created.len(), 2);
        assert_eq!(generated.skipped_dates, vec![from]);
    }

    #[test]
    fn blocked_slots_leave_the_bookable_listing_and_show_as_conflicts() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let slot = fixture.slot(1, 24);

        usecase
            .set_slot_blocked(fixture.instructor_id, slot.id, true, fixture.now)
            .unwrap();

        let bookable = usecase
            .list_slots(
                SlotRangeQuery {
                    instructor_id: fixture.instructor_id,
                    from: fixture.now,
                    to: fixture.now + Duration::days(2),
                    only_bookable: true,
                },
                fixture.now,
            )
            .unwrap();
        assert!(bookable.is_empty());

        let report = usecase
            .conflict_check(
                fixture.instructor_id,
                ConflictCheckModel {
                    start_at: slot.start_at,
                    end_at: slot.end_at,
                    exclude_session_id: None,
                },
            )
            .unwrap();
        assert!(report.has_conflict);
        assert_eq!(report.blocked_slot_ids, vec![slot.id]);
    }

    #[test]
    fn reshaping_a_referenced_window_is_a_conflict() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let created = referenced_window(&fixture, &usecase);

        let err = usecase
            .update(
                fixture.instructor_id,
                created.availability.id,
                UpdateAvailabilityModel {
                    end_time: NaiveTime::from_hms_opt(11, 0, 0),
                    ..Default::default()
                },
                fixture.now,
            )
            .unwrap_err();

        assert!(matches!(err, BookingError::Conflict(_)));
        let slots = fixture
            .store
            .run_in_transaction(|tx| Ok(tx.list_slots_for_availability(created.availability.id)?))
            .unwrap();
        assert_eq!(slots, created.slots);
    }

    #[test]
    fn toggling_a_referenced_window_flips_its_slots_in_place() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let created = referenced_window(&fixture, &usecase);
        assert_eq!(bookable(&fixture, &usecase).len(), 2);

        let deactivated = usecase
            .update(
                fixture.instructor_id,
                created.availability.id,
                UpdateAvailabilityModel {
                    is_active: Some(false),
                    ..Default::default()
                },
                fixture.now,
            )
            .unwrap();

        assert!(!deactivated.availability.is_active);
        assert!(deactivated.slots.iter().all(|slot| !slot.is_available));
        assert!(bookable(&fixture, &usecase).is_empty());
        let free_slot = created.slots[1].id;
        let reserved = fixture
            .store
            .run_in_transaction(|tx| capacity_ledger::reserve(tx, free_slot, None, fixture.now));
        assert!(matches!(reserved, Err(BookingError::Conflict(_))));

        let reactivated = usecase
            .update(
                fixture.instructor_id,
                created.availability.id,
                UpdateAvailabilityModel {
                    is_active: Some(true),
                    ..Default::default()
                },
                fixture.now,
            )
            .unwrap();

        let ids = |slots: &[TimeSlotEntity]| slots.iter().map(|slot| slot.id).collect::<Vec<_>>();
        assert_eq!(ids(&reactivated.slots), ids(&created.slots));
        assert_eq!(ids(&bookable(&fixture, &usecase)), ids(&created.slots));
    }

    #[test]
    fn referenced_window_cannot_be_deleted() {
        let fixture = Fixture::new();
        let usecase = AvailabilityUseCase::new(Arc::clone(&fixture.store));
        let created = referenced_window(&fixture, &usecase);

        let err = usecase
            .delete(fixture.instructor_id, created.availability.id)
            .unwrap_err();

        assert!(matches!(err, BookingError::Conflict(_)));
        let remaining = fixture
            .store
            .run_in_transaction(|tx| Ok(tx.find_availability(created.availability.id)?))
            .unwrap();
        assert!(remaining.is_some());
        assert_eq!(bookable(&fixture, &usecase).len(), 2);
    }
}
