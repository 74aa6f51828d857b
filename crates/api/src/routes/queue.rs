//! Doctor-side queue-call endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{BookingId, DoctorId, ScheduleId};
use registry::{Booking, CallEvent, RegistryStore};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct QueueActionRequest {
    pub doctor_id: DoctorId,
}

/// POST /schedules/:id/call-next — call the lowest-serial pending patient.
#[tracing::instrument(skip(state, req))]
pub async fn call_next<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ScheduleId>,
    Json(req): Json<QueueActionRequest>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.queue.call_next(req.doctor_id, id).await?;
    Ok(Json(booking))
}

/// POST /bookings/:id/complete — close out a called visit as completed.
#[tracing::instrument(skip(state, req))]
pub async fn complete<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookingId>,
    Json(req): Json<QueueActionRequest>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.queue.complete_visit(req.doctor_id, id).await?;
    Ok(Json(booking))
}

/// POST /bookings/:id/missed — record a called patient as a no-show.
#[tracing::instrument(skip(state, req))]
pub async fn missed<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookingId>,
    Json(req): Json<QueueActionRequest>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.queue.mark_missed(req.doctor_id, id).await?;
    Ok(Json(booking))
}

/// GET /schedules/:id/queue — valid bookings ordered by serial.
///
/// Serials may have holes after cancellations; consumers filter on
/// validity, never assume density.
#[tracing::instrument(skip(state))]
pub async fn snapshot<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ScheduleId>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let queue = state.queue.snapshot(id).await?;
    Ok(Json(queue))
}

/// GET /bookings/:id/events — the booking's call history, oldest first.
#[tracing::instrument(skip(state))]
pub async fn events<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookingId>,
) -> Result<Json<Vec<CallEvent>>, ApiError> {
    let events = state.queue.call_events(id).await?;
    Ok(Json(events))
}
