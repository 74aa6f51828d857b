//! Verification-code endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use registry::RegistryStore;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RequestCodeRequest {
    pub phone: String,
}

#[derive(Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
    pub expires_in_secs: u64,
}

#[derive(Deserialize)]
pub struct ConfirmCodeRequest {
    pub challenge: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub verified: bool,
}

/// POST /verification — issue a challenge and deliver its code.
#[tracing::instrument(skip(state, req))]
pub async fn request_code<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RequestCodeRequest>,
) -> Result<(StatusCode, Json<ChallengeResponse>), ApiError> {
    if req.phone.trim().is_empty() {
        return Err(ApiError::BadRequest("phone must not be empty".to_string()));
    }

    let (challenge, code) = state.verification.issue().await;
    state
        .code_sender
        .send_code(&req.phone, &code)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(ChallengeResponse {
            challenge,
            expires_in_secs: state.verification.ttl().as_secs(),
        }),
    ))
}

/// POST /verification/confirm — check a submitted code.
///
/// A successful match consumes the challenge.
#[tracing::instrument(skip(state, req))]
pub async fn confirm_code<S: RegistryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ConfirmCodeRequest>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    if state.verification.verify(&req.challenge, &req.code).await {
        Ok(Json(ConfirmResponse { verified: true }))
    } else {
        Err(ApiError::BadRequest(
            "verification code invalid or expired".to_string(),
        ))
    }
}
