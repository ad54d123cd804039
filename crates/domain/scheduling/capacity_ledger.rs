//! Sole writer of `TimeSlot.current_bookings` and `is_booked`.
//!
//! Admission rule shared by creation, accept and reschedule:
//! `claimed = current_bookings + pending holds other than the request being decided`,
//! and a request is admitted iff `claimed < max_bookings`.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    entities::time_slots::TimeSlotEntity,
    errors::{BookingError, BookingResult},
    repositories::booking_store::StoreTx,
};

/// Locked view of a slot and the holds counted against it.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotCapacity {
    pub slot: TimeSlotEntity,
    pub pending_holds: i64,
}

impl SlotCapacity {
    pub fn claimed(&self) -> i64 {
        i64::from(self.slot.current_bookings) + self.pending_holds
    }

    pub fn remaining(&self) -> i64 {
        (i64::from(self.slot.max_bookings) - self.claimed()).max(0)
    }

    pub fn admits(&self) -> bool {
        self.claimed() < i64::from(self.slot.max_bookings)
    }
}

/// Locks the slot and checks that it can take one more request.
pub fn inspect(
    tx: &mut dyn StoreTx,
    slot_id: Uuid,
    deciding: Option<Uuid>,
) -> BookingResult<SlotCapacity> {
    let slot = tx
        .find_slot_for_update(slot_id)?
        .ok_or_else(|| BookingError::not_found("time_slot", slot_id))?;

    if slot.is_blocked {
        return Err(BookingError::Conflict(format!("slot {slot_id} is blocked")));
    }
    if !slot.is_available {
        return Err(BookingError::Conflict(format!(
            "slot {slot_id} is not available"
        )));
    }

    let pending_holds = tx.count_pending_holds(slot_id, deciding)?;
    let capacity = SlotCapacity {
        slot,
        pending_holds,
    };

    if !capacity.admits() {
        return Err(BookingError::CapacityExceeded(format!(
            "slot {slot_id} has {} of {} places claimed",
            capacity.claimed(),
            capacity.slot.max_bookings
        )));
    }

    Ok(capacity)
}

/// Re-validates admission and takes one place on the slot.
pub fn reserve(
    tx: &mut dyn StoreTx,
    slot_id: Uuid,
    deciding: Option<Uuid>,
    now: DateTime<Utc>,
) -> BookingResult<TimeSlotEntity> {
    let SlotCapacity { mut slot, .. } = inspect(tx, slot_id, deciding)?;

    slot.current_bookings += 1;
    slot.is_booked = slot.current_bookings >= slot.max_bookings;
    slot.updated_at = now;
    tx.write_slot_capacity(slot.id, slot.current_bookings, slot.is_booked, now)?;

    info!(
        %slot_id,
        current_bookings = slot.current_bookings,
        max_bookings = slot.max_bookings,
        "capacity_ledger: reserved place"
    );

    Ok(slot)
}

/// Gives one place back. Never drops below zero, so a double release is harmless.
pub fn release(
    tx: &mut dyn StoreTx,
    slot_id: Uuid,
    now: DateTime<Utc>,
) -> BookingResult<TimeSlotEntity> {
    let mut slot = tx
        .find_slot_for_update(slot_id)?
        .ok_or_else(|| BookingError::not_found("time_slot", slot_id))?;

    slot.current_bookings = (slot.current_bookings - 1).max(0);
    slot.is_booked = slot.current_bookings >= slot.max_bookings;
    slot.updated_at = now;
    tx.write_slot_capacity(slot.id, slot.current_bookings, slot.is_booked, now)?;

    info!(
        %slot_id,
        current_bookings = slot.current_bookings,
        "capacity_ledger: released place"
    );

    Ok(slot)
}
