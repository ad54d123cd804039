use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    entities::{
        live_sessions::LiveSessionEntity,
        payouts::{InstructorPayoutEntity, PayoutSessionEntity},
    },
    errors::{BookingError, BookingResult},
    value_objects::enums::payout_statuses::PayoutBatchStatus,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutBatch {
    pub payout: InstructorPayoutEntity,
    pub sessions: Vec<PayoutSessionEntity>,
}

/// Builds one batch from eligible sessions of a single instructor.
///
/// Only the currency of the oldest session is batched; sessions in other currencies
/// stay eligible for a later batch.
pub fn build_batch(
    instructor_id: Uuid,
    eligible: &[LiveSessionEntity],
    now: DateTime<Utc>,
) -> BookingResult<PayoutBatch> {
    let Some(oldest) = eligible.iter().min_by_key(|s| s.scheduled_start_at) else {
        return Err(BookingError::BadRequest(format!(
            "instructor {instructor_id} has no sessions eligible for payout"
        )));
    };
    let currency = oldest.currency.clone();

    let batched: Vec<&LiveSessionEntity> = eligible
        .iter()
        .filter(|s| s.instructor_id == instructor_id && s.currency == currency)
        .collect();
    if batched.is_empty() {
        return Err(BookingError::BadRequest(format!(
            "instructor {instructor_id} has no sessions eligible for payout"
        )));
    }

    let payout_id = Uuid::new_v4();
    let gross: i64 = batched.iter().map(|s| s.total_revenue_minor).sum();
    let fees: i64 = batched.iter().map(|s| s.platform_fees_minor()).sum();
    let period_start = batched
        .iter()
        .map(|s| s.scheduled_start_at)
        .min()
        .unwrap_or(now);
    let period_end = batched
        .iter()
        .map(|s| s.actual_end_at.unwrap_or(s.scheduled_end_at))
        .max()
        .unwrap_or(now);

    let sessions = batched
        .iter()
        .map(|s| PayoutSessionEntity {
            payout_id,
            session_id: s.id,
            amount_minor: s.instructor_earnings_minor(),
        })
        .collect();

    Ok(PayoutBatch {
        payout: InstructorPayoutEntity {
            id: payout_id,
            instructor_id,
            gross_amount_minor: gross,
            platform_fee_minor: fees,
            net_amount_minor: gross - fees,
            currency,
            session_count: batched.len() as i32,
            status: PayoutBatchStatus::Processing.to_string(),
            provider_reference: None,
            failure_reason: None,
            period_start,
            period_end,
            created_at: now,
            settled_at: None,
        },
        sessions,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn completed(
        instructor_id: Uuid,
        price: i64,
        participants: i32,
        currency: &str,
        days_ago: i64,
    ) -> LiveSessionEntity {
        let start = Utc::now() - Duration::days(days_ago);
        LiveSessionEntity {
            id: Uuid::new_v4(),
            instructor_id,
            offering_id: None,
            booking_request_id: None,
            slot_id: None,
            title: "Session".to_string(),
            description: None,
            scheduled_start_at: start,
            scheduled_end_at: start + Duration::hours(1),
            duration_minutes: 60,
            actual_start_at: Some(start),
            actual_end_at: Some(start + Duration::minutes(55)),
            actual_duration_minutes: Some(55),
            status: "COMPLETED".to_string(),
            max_participants: participants,
            current_participants: participants,
            price_per_person_minor: price,
            platform_fee_minor: price / 10,
            instructor_payout_minor: price - price / 10,
            total_revenue_minor: price * i64::from(participants),
            currency: currency.to_string(),
            cancellation_policy: "MODERATE".to_string(),
            payment_intent_ref: Some("pi_1".to_string()),
            payout_status: "ELIGIBLE".to_string(),
            meeting_room_id: None,
            meeting_join_url: None,
            recording_url: None,
            cancellation_reason: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn sums_gross_fee_and_net() {
        let instructor_id = Uuid::new_v4();
        let sessions = vec![
            completed(instructor_id, 1000, 1, "usd", 3),
            completed(instructor_id, 2000, 2, "usd", 2),
        ];

        let batch = build_batch(instructor_id, &sessions, Utc::now()).unwrap();

        assert_eq!(batch.payout.gross_amount_minor, 5000);
        assert_eq!(batch.payout.platform_fee_minor, 500);
        assert_eq!(batch.payout.net_amount_minor, 4500);
        assert_eq!(batch.payout.session_count, 2);
        assert_eq!(batch.payout.status, "PROCESSING");
        assert_eq!(
            batch.sessions.iter().map(|s| s.amount_minor).sum::<i64>(),
            batch.payout.net_amount_minor
        );
    }

    #[test]
    fn batches_the_oldest_currency_only() {
        let instructor_id = Uuid::new_v4();
        let sessions = vec![
            completed(instructor_id, 1000, 1, "eur", 1),
            completed(instructor_id, 1000, 1, "usd", 5),
        ];

        let batch = build_batch(instructor_id, &sessions, Utc::now()).unwrap();

        assert_eq!(batch.payout.currency, "usd");
        assert_eq!(batch.sessions.len(), 1);
        assert_eq!(batch.sessions[0].session_id, sessions[1].id);
    }

    #[test]
    fn nothing_eligible_is_a_bad_request() {
        assert!(matches!(
            build_batch(Uuid::new_v4(), &[], Utc::now()),
            Err(BookingError::BadRequest(_))
        ));
    }
}
