use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use backend::usecases::{bookings::BookingUseCase, payouts::PayoutUseCase};
use chrono::Utc;
use crates::domain::repositories::{
    booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
    payment_gateway::PaymentGateway, video_provider::VideoProvider,
};
use serde::Deserialize;

use crate::{
    config::config_model::SweepSchedule,
    services::{expiry_sweep, payout_batches},
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/jobs/expire-bookings" \
//     -H "Authorization: Bearer $INTERNAL_JOBS_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"batch_size":100}'

pub struct InternalJobsState<S, P, V, N>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    pub token: Option<String>,
    pub schedule: SweepSchedule,
    pub bookings: Arc<BookingUseCase<S, P, V, N>>,
    pub payouts: Arc<PayoutUseCase<S, P, V, N>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobRequest {
    pub batch_size: Option<i64>,
}

pub fn routes<S, P, V, N>(state: InternalJobsState<S, P, V, N>) -> Router
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    Router::new()
        .route("/expire-bookings", post(expire_bookings::<S, P, V, N>))
        .route("/aggregate-payouts", post(aggregate_payouts::<S, P, V, N>))
        .with_state(Arc::new(state))
}

pub async fn expire_bookings<S, P, V, N>(
    State(state): State<Arc<InternalJobsState<S, P, V, N>>>,
    headers: HeaderMap,
    Json(payload): Json<JobRequest>,
) -> Response
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    if let Err(status) = authorize(&headers, state.token.as_deref()) {
        return (status, "unauthorized").into_response();
    }

    let batch_size = payload
        .batch_size
        .unwrap_or(state.schedule.expiry_batch_size)
        .max(1);
    let report = expiry_sweep::sweep(&state.bookings, Utc::now(), batch_size).await;
    Json(report).into_response()
}

pub async fn aggregate_payouts<S, P, V, N>(
    State(state): State<Arc<InternalJobsState<S, P, V, N>>>,
    headers: HeaderMap,
    Json(payload): Json<JobRequest>,
) -> Response
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    if let Err(status) = authorize(&headers, state.token.as_deref()) {
        return (status, "unauthorized").into_response();
    }

    let limit = payload
        .batch_size
        .unwrap_or(state.schedule.payout_batch_limit)
        .max(1);
    let report = payout_batches::run_once(&state.payouts, Utc::now(), limit).await;
    Json(report).into_response()
}

fn authorize(headers: &HeaderMap, expected_token: Option<&str>) -> Result<(), StatusCode> {
    let expected_token = expected_token.ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn unset_token_disables_triggers() {
        assert_eq!(
            authorize(&headers("Bearer anything"), None),
            Err(StatusCode::SERVICE_UNAVAILABLE)
        );
    }

    #[test]
    fn bearer_token_must_match() {
        assert!(authorize(&headers("Bearer s3cret"), Some("s3cret")).is_ok());
        assert_eq!(
            authorize(&headers("Bearer wrong"), Some("s3cret")),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize(&HeaderMap::new(), Some("s3cret")),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
