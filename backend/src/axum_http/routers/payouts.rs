use crate::{
    auth::{AuthUser, Role},
    axum_http::{
        error_responses::{AppError, AppResult},
        routers::{instructor_scope, require_admin},
    },
    usecases::{outbox::EffectRunner, payouts::PayoutUseCase},
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
    value_objects::payouts::{PayoutListFilter, PayoutSettlementModel},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct AggregateRequest {
    /// Admin only. Instructors always aggregate their own sessions.
    #[serde(default)]
    instructor_id: Option<Uuid>,
}

pub fn routes<S, P, V, N>(effects: EffectRunner<S, P, V, N>) -> Router
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let usecase = PayoutUseCase::new(effects);

    Router::new()
        .route("/", post(aggregate::<S, P, V, N>).get(list::<S, P, V, N>))
        .route("/:payout_id", get(get_payout::<S, P, V, N>))
        .route("/:payout_id/settle", post(settle::<S, P, V, N>))
        .with_state(Arc::new(usecase))
}

pub async fn aggregate<S, P, V, N>(
    State(usecase): State<Arc<PayoutUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Json(request): Json<AggregateRequest>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = match (auth.role, request.instructor_id) {
        (Role::Instructor, _) => auth.user_id,
        (Role::Admin, Some(instructor_id)) => instructor_id,
        (Role::Admin, None) => {
            return Err(AppError::BadRequest(
                "instructor_id is required".to_string(),
            ));
        }
        (Role::Consumer, _) => {
            return Err(AppError::Forbidden(
                "instructor or admin role required".to_string(),
            ));
        }
    };

    info!(%instructor_id, "payouts: aggregation requested");
    let details = usecase.aggregate(instructor_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list<S, P, V, N>(
    State(usecase): State<Arc<PayoutUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Query(filter): Query<PayoutListFilter>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let scope = instructor_scope(&auth)?;
    Ok(Json(usecase.list(scope, filter)?))
}

pub async fn get_payout<S, P, V, N>(
    State(usecase): State<Arc<PayoutUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(payout_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let scope = instructor_scope(&auth)?;
    Ok(Json(usecase.get(scope, payout_id)?))
}

pub async fn settle<S, P, V, N>(
    State(usecase): State<Arc<PayoutUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(payout_id): Path<Uuid>,
    Json(model): Json<PayoutSettlementModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    require_admin(&auth)?;
    info!(%payout_id, status = %model.status, "payouts: settlement received");
    Ok(Json(usecase.settle(payout_id, model, Utc::now()).await?))
}
