use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use domain::{Pagination, Role};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Patient, PatientProfile, PatientScope, UpdatePatient};
use crate::response::{done, ok, ok_with, ApiResult, Page};
use crate::state::AppState;

/// Roles that may look patients up.
const READERS: &[Role] = &[
    Role::Doctor,
    Role::ClinicAdmin,
    Role::Receptionist,
    Role::Nurse,
    Role::Lab,
    Role::Admin,
];

/// Roles that may edit another person's patient record.
const EDITORS: &[Role] = &[Role::ClinicAdmin, Role::Receptionist, Role::Nurse, Role::Admin];

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/me", get(me).put(update_me))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// Which patients a non-patient caller can see.
pub(crate) fn scope_for(auth: &AuthUser) -> Result<PatientScope, ApiError> {
    match auth.role {
        Role::Admin => Ok(PatientScope::All),
        Role::Doctor => Ok(PatientScope::Doctor(auth.require_doctor_id()?)),
        Role::ClinicAdmin | Role::Receptionist | Role::Nurse | Role::Lab | Role::Pharmacy => {
            Ok(PatientScope::Clinic(auth.require_clinic_id()?))
        }
        Role::Patient => Err(ApiError::forbidden("Access denied")),
    }
}

/// 404 unless the caller is the patient or the patient is within their scope.
pub(crate) async fn ensure_can_view(
    pool: &PgPool,
    auth: &AuthUser,
    patient_id: Uuid,
) -> Result<(), ApiError> {
    if auth.patient_id == Some(patient_id) {
        return Ok(());
    }
    let scope = scope_for(auth)?;
    if Patient::in_scope(pool, patient_id, scope).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("Patient"))
    }
}

/// 403 unless the calling doctor has seen the patient.
pub(crate) async fn ensure_treating(
    pool: &PgPool,
    auth: &AuthUser,
    patient_id: Uuid,
) -> Result<(), ApiError> {
    let doctor_id = auth.require_doctor_id()?;
    if Patient::in_scope(pool, patient_id, PatientScope::Doctor(doctor_id)).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden("Patient is not under your care"))
    }
}

async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<PatientProfile>> {
    auth.authorize(READERS)?;
    let scope = scope_for(&auth)?;
    let page = Pagination::new(query.page, query.limit);
    let (items, total) = Patient::list(&state.pool, scope, query.search.as_deref(), page).await?;
    ok(Page::new(items, total, page))
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<PatientProfile> {
    auth.authorize(&[Role::Patient])?;
    let id = auth.require_patient_id()?;
    let patient = Patient::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;
    ok(patient)
}

async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdatePatient>,
) -> ApiResult<PatientProfile> {
    auth.authorize(&[Role::Patient])?;
    let id = auth.require_patient_id()?;
    let patient = Patient::update(&state.pool, id, &body).await?;
    ok_with(patient, "Profile updated")
}

async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<PatientProfile> {
    ensure_can_view(&state.pool, &auth, id).await?;
    let patient = Patient::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;
    ok(patient)
}

async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePatient>,
) -> ApiResult<PatientProfile> {
    auth.authorize(EDITORS)?;
    ensure_can_view(&state.pool, &auth, id).await?;
    let patient = Patient::update(&state.pool, id, &body).await?;
    ok_with(patient, "Patient updated")
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.authorize(&[Role::Admin])?;
    if !Patient::deactivate(&state.pool, id).await? {
        return Err(ApiError::not_found("Patient"));
    }
    tracing::info!(patient_id = %id, by = %auth.id, "patient deactivated");
    done("Patient deleted")
}
