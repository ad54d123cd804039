use anyhow::Result;
use backend::usecases::bookings::BookingUseCase;
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::{
        booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway, video_provider::VideoProvider,
    },
    value_objects::bookings::ExpirySweepReport,
};
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Upper bound on back-to-back batches within one tick.
const MAX_BATCHES_PER_TICK: usize = 10;

pub async fn run<S, P, V, N>(
    usecase: Arc<BookingUseCase<S, P, V, N>>,
    interval_secs: u64,
    batch_size: i64,
) -> Result<()>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    info!(interval_secs, batch_size, "expiry_sweep: starting worker loop");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep(&usecase, Utc::now(), batch_size).await;
    }
}

/// Expires overdue requests, draining full batches until the backlog is gone.
pub async fn sweep<S, P, V, N>(
    usecase: &BookingUseCase<S, P, V, N>,
    now: DateTime<Utc>,
    batch_size: i64,
) -> ExpirySweepReport
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let mut total = ExpirySweepReport::default();

    for _ in 0..MAX_BATCHES_PER_TICK {
        let report = match usecase.expire_overdue(now, batch_size).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = ?err, "expiry_sweep: failed to scan overdue requests");
                break;
            }
        };

        total.scanned += report.scanned;
        total.expired += report.expired;
        total.failed += report.failed;

        let full_batch = i64::try_from(report.scanned).is_ok_and(|n| n >= batch_size);
        if !full_batch || report.expired == 0 {
            break;
        }
    }

    if total.scanned == 0 {
        debug!("expiry_sweep: nothing overdue");
    } else {
        info!(
            scanned = total.scanned,
            expired = total.expired,
            failed = total.failed,
            "expiry_sweep: tick finished"
        );
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::usecases::outbox::EffectRunner;
    use chrono::Duration as ChronoDuration;
    use crates::{
        domain::{
            entities::booking_requests::BookingRequestEntity,
            repositories::{
                notification_dispatcher::MockNotificationDispatcher,
                payment_gateway::MockPaymentGateway, video_provider::MockVideoProvider,
            },
            value_objects::{
                enums::{
                    booking_modes::BookingMode, booking_statuses::BookingStatus,
                    payment_statuses::PaymentStatus,
                },
                settings::BookingSettings,
            },
        },
        infra::memory::booking_store::InMemoryBookingStore,
    };
    use uuid::Uuid;

    fn pending_request(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> BookingRequestEntity {
        BookingRequestEntity {
            id: Uuid::new_v4(),
            offering_id: Uuid::new_v4(),
            consumer_id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            slot_id: None,
            mode: BookingMode::Request.as_str().to_string(),
            status: BookingStatus::Pending.as_str().to_string(),
            requested_start_at: Some(now + ChronoDuration::days(2)),
            requested_end_at: Some(now + ChronoDuration::days(2) + ChronoDuration::hours(1)),
            offered_price_minor: 8_000,
            final_price_minor: None,
            currency: "USD".to_string(),
            expires_at,
            reschedule_count: 0,
            payment_status: PaymentStatus::Pending.as_str().to_string(),
            payment_intent_ref: None,
            refunded_amount_minor: 0,
            consumer_message: None,
            instructor_response: None,
            cancellation_reason: None,
            cancelled_by: None,
            responded_at: None,
            created_at: now - ChronoDuration::days(1),
            updated_at: now - ChronoDuration::days(1),
        }
    }

    fn usecase(
        store: Arc<InMemoryBookingStore>,
        expected_notifications: usize,
    ) -> BookingUseCase<InMemoryBookingStore, MockPaymentGateway, MockVideoProvider, MockNotificationDispatcher>
    {
        let mut notifier = MockNotificationDispatcher::new();
        notifier
            .expect_notify()
            .times(expected_notifications)
            .returning(|_| Box::pin(async move { Ok(()) }));

        let effects = EffectRunner::new(
            store,
            Arc::new(MockPaymentGateway::new()),
            Arc::new(MockVideoProvider::new()),
            Arc::new(notifier),
        );
        BookingUseCase::new(effects, BookingSettings::default())
    }

    #[tokio::test]
    async fn drains_backlog_larger_than_one_batch() {
        let now = Utc::now();
        let store = Arc::new(InMemoryBookingStore::new());
        let overdue: Vec<_> = (0..5)
            .map(|_| pending_request(now, now - ChronoDuration::minutes(5)))
            .collect();
        let fresh = pending_request(now, now + ChronoDuration::hours(3));
        store
            .run_in_transaction(|tx| {
                for booking in overdue.iter().chain(std::iter::once(&fresh)) {
                    tx.insert_booking(booking)?;
                }
                Ok(())
            })
            .unwrap();

        let usecase = usecase(Arc::clone(&store), 5);
        let report = sweep(&usecase, now, 2).await;

        assert_eq!(report.expired, 5);
        assert_eq!(report.failed, 0);

        let still_pending = store
            .run_in_transaction(|tx| Ok(tx.find_booking(fresh.id)?))
            .unwrap()
            .unwrap();
        assert_eq!(still_pending.status, BookingStatus::Pending.as_str());
    }

    #[tokio::test]
    async fn second_tick_finds_nothing() {
        let now = Utc::now();
        let store = Arc::new(InMemoryBookingStore::new());
        let overdue = pending_request(now, now - ChronoDuration::seconds(1));
        store
            .run_in_transaction(|tx| Ok(tx.insert_booking(&overdue)?))
            .unwrap();

        let usecase = usecase(Arc::clone(&store), 1);
        assert_eq!(sweep(&usecase, now, 50).await.expired, 1);

        let again = sweep(&usecase, now, 50).await;
        assert_eq!(again, ExpirySweepReport::default());
    }
}
