//! Patient-facing booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{BookingId, DoctorId, HalfDay, PatientId, ScheduleId};
use domain::BookingRequest;
use registry::{BookingStatus, BookingSummary, CancellationReceipt, RegistryStore};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub patient_id: PatientId,

    /// Either `schedule_id` or the full (doctor, date, half-day) triple;
    /// supplying both forms is rejected.
    pub schedule_id: Option<ScheduleId>,
    pub doctor_id: Option<DoctorId>,
    pub date: Option<NaiveDate>,
    pub half_day: Option<HalfDay>,

    pub time_label: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelBookingRequest {
    pub patient_id: PatientId,
}

#[derive(Deserialize)]
pub struct BookingListParams {
    pub patient_id: PatientId,
    pub status: Option<BookingStatus>,
}

#[derive(Deserialize)]
pub struct BookingOwnerParams {
    pub patient_id: PatientId,
}

/// POST /bookings — claim one capacity unit on a schedule.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingSummary>), ApiError> {
    let request = BookingRequest {
        schedule_id: req.schedule_id,
        doctor_id: req.doctor_id,
        date: req.date,
        half_day: req.half_day,
        time_label: req.time_label,
    };
    let summary = state.bookings.create_booking(req.patient_id, request).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// POST /bookings/:id/cancel — cancel the caller's booking.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookingId>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<CancellationReceipt>, ApiError> {
    let receipt = state.bookings.cancel_booking(req.patient_id, id).await?;
    Ok(Json(receipt))
}

/// GET /bookings — the caller's valid bookings, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<BookingListParams>,
) -> Result<Json<Vec<BookingSummary>>, ApiError> {
    let bookings = state
        .bookings
        .list_bookings(params.patient_id, params.status)
        .await?;
    Ok(Json(bookings))
}

/// GET /bookings/:id — detail for one of the caller's bookings.
#[tracing::instrument(skip(state, params))]
pub async fn get<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookingId>,
    Query(params): Query<BookingOwnerParams>,
) -> Result<Json<BookingSummary>, ApiError> {
    let booking = state.bookings.get_booking(params.patient_id, id).await?;
    Ok(Json(booking))
}
