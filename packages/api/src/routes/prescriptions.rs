use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use domain::{Lifecycle, PrescriptionStatus, Role};
use serde::Deserialize;
use uuid::Uuid;

use super::patients::{ensure_can_view, ensure_treating};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{NewPrescription, Prescription, PrescriptionDetails};
use crate::response::{created, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/me", get(mine))
        .route("/patient/{patient_id}", get(for_patient))
        .route("/{id}", get(show))
        .route("/{id}/status", patch(update_status))
}

async fn load_visible(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> Result<PrescriptionDetails, ApiError> {
    let details = Prescription::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription"))?;
    let prescription = &details.prescription;
    match auth.role {
        Role::Doctor if auth.doctor_id == Some(prescription.doctor_id) => {}
        Role::Patient if auth.patient_id == Some(prescription.patient_id) => {}
        Role::Patient | Role::Doctor => return Err(ApiError::not_found("Prescription")),
        _ => ensure_can_view(&state.pool, auth, prescription.patient_id)
            .await
            .map_err(|_| ApiError::not_found("Prescription"))?,
    }
    Ok(details)
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewPrescription>,
) -> Created<PrescriptionDetails> {
    auth.authorize(&[Role::Doctor])?;
    let doctor_id = auth.require_doctor_id()?;
    body.validate()?;
    ensure_treating(&state.pool, &auth, body.patient_id).await?;

    let details = Prescription::create(&state.pool, doctor_id, auth.clinic_id, &body).await?;
    tracing::info!(
        prescription_id = %details.prescription.id,
        patient_id = %body.patient_id,
        lab_tests = body.lab_tests.len(),
        "prescription written"
    );
    created(details, "Prescription created")
}

async fn mine(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<PrescriptionDetails>> {
    let list = match auth.role {
        Role::Patient => Prescription::for_patient(&state.pool, auth.require_patient_id()?).await?,
        Role::Doctor => Prescription::for_doctor(&state.pool, auth.require_doctor_id()?).await?,
        _ => return Err(ApiError::forbidden("Access denied")),
    };
    ok(list)
}

async fn for_patient(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Vec<PrescriptionDetails>> {
    ensure_can_view(&state.pool, &auth, patient_id).await?;
    ok(Prescription::for_patient(&state.pool, patient_id).await?)
}

async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<PrescriptionDetails> {
    ok(load_visible(&state, &auth, id).await?)
}

async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Prescription> {
    auth.authorize(&[Role::Doctor])?;
    let to = PrescriptionStatus::parse(&body.status)?;
    let details = load_visible(&state, &auth, id).await?;

    let updated = Prescription::transition(&state.pool, &details.prescription, to).await?;
    ok_with(updated, format!("Prescription marked {}", to.as_str()))
}
