use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::AppResult,
        routers::{require_admin, require_instructor},
    },
    usecases::{bookings::BookingUseCase, outbox::EffectRunner},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use crates::domain::{
    repositories::{
        booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway, video_provider::VideoProvider,
    },
    value_objects::{
        bookings::{
            AcceptBookingModel, BookingListFilter, BookingRole, CancelBookingModel,
            CreateBookingModel, RejectBookingModel, RescheduleBookingModel,
        },
        enums::{booking_statuses::BookingStatus, sort_order::SortOrder},
        settings::BookingSettings,
    },
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const DEFAULT_EXPIRY_BATCH: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    #[serde(default)]
    role: BookingRole,
    status: Option<BookingStatus>,
    offering_id: Option<Uuid>,
    limit: Option<i64>,
    offset: Option<i64>,
    #[serde(default)]
    sort_order: SortOrder,
}

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    #[serde(default)]
    role: BookingRole,
}

#[derive(Debug, Deserialize)]
pub struct ExpireQuery {
    batch_size: Option<i64>,
}

pub fn routes<S, P, V, N>(effects: EffectRunner<S, P, V, N>, settings: BookingSettings) -> Router
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let usecase = BookingUseCase::new(effects, settings);

    Router::new()
        .route("/", post(create::<S, P, V, N>).get(list::<S, P, V, N>))
        .route("/stats", get(stats::<S, P, V, N>))
        .route("/expire", post(expire_overdue::<S, P, V, N>))
        .route("/:booking_id", get(get_booking::<S, P, V, N>))
        .route("/:booking_id/accept", post(accept::<S, P, V, N>))
        .route("/:booking_id/reject", post(reject::<S, P, V, N>))
        .route("/:booking_id/cancel", post(cancel::<S, P, V, N>))
        .route("/:booking_id/reschedule", post(reschedule::<S, P, V, N>))
        .route("/:booking_id/refund-quote", get(refund_quote::<S, P, V, N>))
        .route("/:booking_id/payment", post(start_payment::<S, P, V, N>))
        .with_state(Arc::new(usecase))
}

pub async fn create<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(model): Json<CreateBookingModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    info!(%user_id, offering_id = %model.offering_id, "bookings: create request received");
    let created = usecase.create(user_id, model, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_booking<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    Ok(Json(usecase.get(user_id, booking_id)?))
}

pub async fn list<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<ListBookingsQuery>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let filter = BookingListFilter {
        offering_id: query.offering_id,
        status: query.status,
        limit: query.limit,
        offset: query.offset,
        sort_order: query.sort_order,
        ..Default::default()
    };
    Ok(Json(usecase.list(user_id, query.role, filter)?))
}

pub async fn stats<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<RoleQuery>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    Ok(Json(usecase.stats(user_id, query.role)?))
}

pub async fn accept<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(model): Json<AcceptBookingModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    info!(%instructor_id, %booking_id, "bookings: accept request received");
    Ok(Json(
        usecase
            .accept(instructor_id, booking_id, model, Utc::now())
            .await?,
    ))
}

pub async fn reject<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(model): Json<RejectBookingModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(
        usecase
            .reject(instructor_id, booking_id, model, Utc::now())
            .await?,
    ))
}

pub async fn cancel<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(model): Json<CancelBookingModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    info!(%user_id, %booking_id, "bookings: cancel request received");
    Ok(Json(
        usecase
            .cancel(user_id, booking_id, model, Utc::now())
            .await?,
    ))
}

pub async fn reschedule<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(model): Json<RescheduleBookingModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    Ok(Json(
        usecase
            .reschedule(user_id, booking_id, model, Utc::now())
            .await?,
    ))
}

pub async fn refund_quote<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    Ok(Json(usecase.refund_quote(user_id, booking_id, Utc::now())?))
}

pub async fn start_payment<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let intent = usecase
        .start_payment(user_id, booking_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

pub async fn expire_overdue<S, P, V, N>(
    State(usecase): State<Arc<BookingUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Query(query): Query<ExpireQuery>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    require_admin(&auth)?;
    let batch_size = query.batch_size.unwrap_or(DEFAULT_EXPIRY_BATCH).max(1);
    let report = usecase.expire_overdue(Utc::now(), batch_size).await?;
    info!(expired = report.expired, "bookings: manual expiry sweep finished");
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::usecases::test_support::{Fixture, quiet_notifier, runner};
    use crates::domain::repositories::{
        payment_gateway::MockPaymentGateway, video_provider::MockVideoProvider,
    };

    fn app() -> Router {
        let fixture = Fixture::new();
        let effects = runner(
            &fixture,
            MockPaymentGateway::new(),
            MockVideoProvider::new(),
            quiet_notifier(),
        );
        routes(effects, BookingSettings::default())
    }

    #[tokio::test]
    async fn requests_without_a_bearer_token_are_unauthorized() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(format!("/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_schemes_are_unauthorized() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/not-a-uuid")
                    .header("authorization", "Basic abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
