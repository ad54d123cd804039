use anyhow::Result;
use backend::usecases::payouts::PayoutUseCase;
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::{
        booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway, video_provider::VideoProvider,
    },
    value_objects::payouts::PayoutRunReport,
};
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub async fn run<S, P, V, N>(
    usecase: Arc<PayoutUseCase<S, P, V, N>>,
    interval_secs: u64,
    instructor_limit: i64,
) -> Result<()>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    info!(interval_secs, instructor_limit, "payout_batches: starting worker loop");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        run_once(&usecase, Utc::now(), instructor_limit).await;
    }
}

pub async fn run_once<S, P, V, N>(
    usecase: &PayoutUseCase<S, P, V, N>,
    now: DateTime<Utc>,
    instructor_limit: i64,
) -> PayoutRunReport
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    match usecase.aggregate_all(now, instructor_limit).await {
        Ok(report) if report.instructors == 0 => {
            debug!("payout_batches: no eligible sessions");
            report
        }
        Ok(report) => {
            if report.failed > 0 {
                warn!(
                    created = report.created,
                    failed = report.failed,
                    "payout_batches: run finished with failures"
                );
            } else {
                info!(created = report.created, "payout_batches: run finished");
            }
            report
        }
        Err(err) => {
            error!(error = ?err, "payout_batches: failed to list eligible instructors");
            PayoutRunReport::default()
        }
    }
}
