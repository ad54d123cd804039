use crate::{
    auth::AuthUser,
    axum_http::{error_responses::AppResult, routers::require_instructor},
    usecases::availability::AvailabilityUseCase,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;
use crates::domain::{
    repositories::booking_store::BookingStore,
    value_objects::availability::{
        ConflictCheckModel, CreateAvailabilityModel, GenerateAvailabilityRangeModel,
        SlotRangeQuery, UpdateAvailabilityModel,
    },
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub fn routes<S>(store: Arc<S>) -> Router
where
    S: BookingStore,
{
    let usecase = AvailabilityUseCase::new(store);

    Router::new()
        .route("/", post(create::<S>))
        .route(
            "/:availability_id",
            patch(update::<S>).delete(delete::<S>),
        )
        .route("/generate", post(generate_range::<S>))
        .route("/conflicts", post(conflict_check::<S>))
        .route("/slots", get(list_slots::<S>))
        .route("/slots/:slot_id/block", post(block_slot::<S>))
        .route("/slots/:slot_id/unblock", post(unblock_slot::<S>))
        .with_state(Arc::new(usecase))
}

pub async fn create<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    auth: AuthUser,
    Json(model): Json<CreateAvailabilityModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    let instructor_id = require_instructor(&auth)?;
    info!(%instructor_id, date = %model.date, "availability: create request received");

    let created = usecase.create(instructor_id, model, Utc::now())?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    auth: AuthUser,
    Path(availability_id): Path<Uuid>,
    Json(model): Json<UpdateAvailabilityModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    let instructor_id = require_instructor(&auth)?;
    let updated = usecase.update(instructor_id, availability_id, model, Utc::now())?;
    Ok(Json(updated))
}

pub async fn delete<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    auth: AuthUser,
    Path(availability_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    let instructor_id = require_instructor(&auth)?;
    usecase.delete(instructor_id, availability_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn generate_range<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    auth: AuthUser,
    Json(model): Json<GenerateAvailabilityRangeModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    let instructor_id = require_instructor(&auth)?;
    info!(%instructor_id, from = %model.from, to = %model.to, "availability: range generation requested");

    let generated = usecase.generate_range(instructor_id, model, Utc::now())?;
    Ok((StatusCode::CREATED, Json(generated)))
}

pub async fn conflict_check<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    auth: AuthUser,
    Json(model): Json<ConflictCheckModel>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.conflict_check(instructor_id, model)?))
}

pub async fn list_slots<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    _auth: AuthUser,
    Query(query): Query<SlotRangeQuery>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    Ok(Json(usecase.list_slots(query, Utc::now())?))
}

pub async fn block_slot<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    auth: AuthUser,
    Path(slot_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.set_slot_blocked(
        instructor_id,
        slot_id,
        true,
        Utc::now(),
    )?))
}

pub async fn unblock_slot<S>(
    State(usecase): State<Arc<AvailabilityUseCase<S>>>,
    auth: AuthUser,
    Path(slot_id): Path<Uuid>,
) -> AppResult<impl IntoResponse>
where
    S: BookingStore,
{
    let instructor_id = require_instructor(&auth)?;
    Ok(Json(usecase.set_slot_blocked(
        instructor_id,
        slot_id,
        false,
        Utc::now(),
    )?))
}
