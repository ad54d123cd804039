use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::AppResult,
        routers::{instructor_scope, require_instructor},
    },
    usecases::{outbox::EffectRunner, sessions::SessionUseCase},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::{
        booking_store::BookingStore, notification_dispatcher::NotificationDispatcher,
        payment_gateway::PaymentGateway, video_provider::VideoProvider,
    },
    value_objects::{
        enums::{session_statuses::SessionStatus, sort_order::SortOrder},
        sessions::{
            AttendanceAction, CancelSessionModel, CreateSessionModel, RescheduleSessionModel,
            SessionListFilter, UpdateSessionModel,
        },
        settings::BookingSettings,
    },
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    /// Lists sessions the caller is enrolled in instead of the ones they teach.
    #[serde(default)]
    as_participant: bool,
    status: Option<SessionStatus>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: Option<i64>,
    offset: Option<i64>,
    #[serde(default)]
    sort_order: SortOrder,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    action: AttendanceAction,
}

pub fn routes<S, P, V, N>(effects: EffectRunner<S, P, V, N>, settings: BookingSettings) -> Router
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let usecase = SessionUseCase::new(effects, settings);

    Router::new()
        .route("/", post(create::<S, P, V, N>).get(list::<S, P, V, N>))
        .route("/stats", get(stats::<S, P, V, N>))
        .route(
            "/:session_id",
            get(get_session::<S, P, V, N>).patch(update::<S, P, V, N>),
        )
        .route("/:session_id/confirm", post(confirm::<S, P, V, N>))
        .route("/:session_id/unconfirm", post(unconfirm::<S, P, V, N>))
        .route("/:session_id/start", post(start::<S, P, V, N>))
        .route("/:session_id/end", post(end::<S, P, V, N>))
        .route("/:session_id/cancel", post(cancel::<S, P, V, N>))
        .route("/:session_id/reschedule", post(reschedule::<S, P, V, N>))
        .route(
            "/:session_id/participants",
            post(add_participant::<S, P, V, N>),
        )
        .route(
            "/:session_id/participants/:user_id",
            delete(remove_participant::<S, P, V, N>),
        )
        .route("/:session_id/attendance", post(attendance::<S, P, V, N>))
        .route(
            "/:session_id/retry-capture",
            post(retry_capture::<S, P, V, N>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn create<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Json(model): Json<CreateSessionModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    info!(%instructor_id, "sessions: create request received");
    let session = usecase.create(instructor_id, model, Utc::now())?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    Ok(Json(usecase.get(user_id, session_id)?))
}

pub async fn update<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(model): Json<UpdateSessionModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.update(
        instructor_id,
        session_id,
        model,
        Utc::now(),
    )?))
}

pub async fn list<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let filter = SessionListFilter {
        participant_id: query.as_participant.then_some(user_id),
        status: query.status,
        from: query.from,
        to: query.to,
        limit: query.limit,
        offset: query.offset,
        sort_order: query.sort_order,
        ..Default::default()
    };
    Ok(Json(usecase.list(user_id, filter)?))
}

pub async fn stats<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.stats(instructor_id)?))
}

pub async fn confirm<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.confirm(instructor_id, session_id, Utc::now())?))
}

pub async fn unconfirm<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.unconfirm(
        instructor_id,
        session_id,
        Utc::now(),
    )?))
}

pub async fn start<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    info!(%instructor_id, %session_id, "sessions: start request received");
    Ok(Json(
        usecase
            .start(instructor_id, session_id, Utc::now())
            .await?,
    ))
}

pub async fn end<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    info!(%instructor_id, %session_id, "sessions: end request received");
    Ok(Json(
        usecase.end(instructor_id, session_id, Utc::now()).await?,
    ))
}

pub async fn cancel<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(model): Json<CancelSessionModel>,
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
            .cancel(instructor_id, session_id, model, Utc::now())
            .await?,
    ))
}

pub async fn reschedule<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(model): Json<RescheduleSessionModel>,
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
            .reschedule(instructor_id, session_id, model, Utc::now())
            .await?,
    ))
}

pub async fn add_participant<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AddParticipantRequest>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    let participant =
        usecase.add_participant(instructor_id, session_id, request.user_id, Utc::now())?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn remove_participant<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path((session_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.remove_participant(
        instructor_id,
        session_id,
        user_id,
        Utc::now(),
    )?))
}

pub async fn attendance<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AttendanceRequest>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    Ok(Json(usecase.attendance(
        user_id,
        session_id,
        request.action,
        Utc::now(),
    )?))
}

pub async fn retry_capture<S, P, V, N>(
    State(usecase): State<Arc<SessionUseCase<S, P, V, N>>>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
    P: PaymentGateway + Send + Sync + 'static,
    V: VideoProvider + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    let scope = instructor_scope(&auth)?;
    info!(?scope, %session_id, "sessions: capture retry requested");
    Ok(Json(usecase.retry_capture(scope, session_id).await?))
}
