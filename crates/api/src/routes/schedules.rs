//! Schedule publication, review, and availability endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{AdminId, DeptId, DoctorId, HalfDay, ScheduleId};
use registry::{
    AvailabilityQuery, AvailableSlot, RegistryStore, ReviewOutcome, Schedule, ScheduleReview,
    ScheduleSelector,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PublishScheduleRequest {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub half_day: HalfDay,
    pub max_capacity: i32,
}

#[derive(Deserialize)]
pub struct ReviewScheduleRequest {
    pub admin_id: AdminId,
    pub outcome: ReviewOutcome,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct AvailabilityParams {
    pub dept_id: Option<DeptId>,
    pub doctor_id: Option<DoctorId>,
    pub date: Option<NaiveDate>,
}

/// GET /schedules/available — approved schedules with capacity left.
///
/// The result is a snapshot; the booking coordinator re-checks capacity
/// under lock.
#[tracing::instrument(skip(state, params))]
pub async fn available<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<AvailableSlot>>, ApiError> {
    let query = AvailabilityQuery {
        dept_id: params.dept_id,
        doctor_id: params.doctor_id,
        date: params.date,
    };
    let slots = state.bookings.list_available(query).await?;
    Ok(Json(slots))
}

/// POST /schedules — publish a pending schedule.
#[tracing::instrument(skip(state, req))]
pub async fn publish<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PublishScheduleRequest>,
) -> Result<(StatusCode, Json<Schedule>), ApiError> {
    let schedule = state
        .schedules
        .publish(req.doctor_id, req.date, req.half_day, req.max_capacity)
        .await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// GET /schedules/:id — capacity state of an approved schedule.
#[tracing::instrument(skip(state))]
pub async fn get<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ScheduleId>,
) -> Result<Json<Schedule>, ApiError> {
    let schedule = state
        .schedules
        .slot(&ScheduleSelector::by_id(id))
        .await?;
    Ok(Json(schedule))
}

/// POST /schedules/:id/review — apply an admin review.
#[tracing::instrument(skip(state, req))]
pub async fn review<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ScheduleId>,
    Json(req): Json<ReviewScheduleRequest>,
) -> Result<Json<Schedule>, ApiError> {
    let schedule = state
        .schedules
        .review(req.admin_id, id, req.outcome, req.reason.as_deref())
        .await?;
    Ok(Json(schedule))
}

/// GET /schedules/:id/reviews — the audit trail, oldest first.
#[tracing::instrument(skip(state))]
pub async fn reviews<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ScheduleId>,
) -> Result<Json<Vec<ScheduleReview>>, ApiError> {
    let trail = state.schedules.reviews(id).await?;
    Ok(Json(trail))
}
