//! Directory endpoints for departments, doctors, and patients.
//!
//! These back the denormalized display joins; accounts and credentials
//! live in the identity collaborator.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::DeptId;
use registry::{Department, Doctor, Patient, RegistryStore};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateDoctorRequest {
    pub dept_id: DeptId,
    pub name: String,
    pub title: String,
}

#[derive(Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub phone: String,
}

/// POST /departments — register a department.
#[tracing::instrument(skip(state, req))]
pub async fn create_department<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<Department>), ApiError> {
    let department = state.store.create_department(&req.name).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

/// POST /doctors — register a doctor under a department.
#[tracing::instrument(skip(state, req))]
pub async fn create_doctor<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Doctor>), ApiError> {
    let doctor = state
        .store
        .create_doctor(req.dept_id, &req.name, &req.title)
        .await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

/// POST /patients — register a patient.
#[tracing::instrument(skip(state, req))]
pub async fn create_patient<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = state.store.create_patient(&req.name, &req.phone).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}
