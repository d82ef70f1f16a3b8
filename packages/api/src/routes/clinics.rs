use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use domain::slots::format_slot_time;
use domain::{AppointmentStatus, Lifecycle, Pagination, Role};
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_date, CLINIC_DESK};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentDetails, Clinic, ClinicSummary, Doctor, DoctorProfile, Patient,
    PatientProfile, PatientScope, UpdateClinic,
};
use crate::response::{ok, ok_with, ApiResult, Page};
use crate::state::AppState;

/// Everyone attached to a clinic.
const MEMBERS: &[Role] = &[
    Role::ClinicAdmin,
    Role::Receptionist,
    Role::Nurse,
    Role::Lab,
    Role::Pharmacy,
];

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub city: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PatientsQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueUpdate {
    pub status: String,
    pub notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/me", get(me).put(update_me))
        .route("/me/doctors", get(my_doctors))
        .route("/me/patients", get(my_patients))
        .route("/me/queue", get(queue))
        .route("/me/queue/{appointment_id}", patch(update_queue))
        .route("/{id}", get(show))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<ClinicSummary>> {
    let page = Pagination::new(query.page, query.limit);
    let (items, total) = Clinic::list(
        &state.pool,
        query.search.as_deref(),
        query.city.as_deref(),
        page,
    )
    .await?;
    ok(Page::new(items, total, page))
}

async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<ClinicSummary> {
    let clinic = Clinic::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Clinic"))?;
    ok(clinic)
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<ClinicSummary> {
    auth.authorize(MEMBERS)?;
    let clinic = Clinic::find(&state.pool, auth.require_clinic_id()?)
        .await?
        .ok_or_else(|| ApiError::not_found("Clinic"))?;
    ok(clinic)
}

async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut body): Json<UpdateClinic>,
) -> ApiResult<Clinic> {
    auth.authorize(&[Role::ClinicAdmin])?;
    let id = auth.require_clinic_id()?;

    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Clinic name cannot be blank"));
    }
    body.opening_time = body.opening_time.as_deref().map(format_slot_time).transpose()?;
    body.closing_time = body.closing_time.as_deref().map(format_slot_time).transpose()?;

    let clinic = Clinic::update(&state.pool, id, &body).await?;
    ok_with(clinic, "Clinic updated")
}

async fn my_doctors(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<DoctorProfile>> {
    auth.authorize(MEMBERS)?;
    let doctors = Doctor::list_by_clinic(&state.pool, auth.require_clinic_id()?).await?;
    ok(doctors)
}

async fn my_patients(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PatientsQuery>,
) -> ApiResult<Page<PatientProfile>> {
    auth.authorize(CLINIC_DESK)?;
    let scope = PatientScope::Clinic(auth.require_clinic_id()?);
    let page = Pagination::new(query.page, query.limit);
    let (items, total) = Patient::list(&state.pool, scope, query.search.as_deref(), page).await?;
    ok(Page::new(items, total, page))
}

/// The day's appointments in queue order, today when no date is given.
async fn queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Vec<AppointmentDetails>> {
    auth.authorize(CLINIC_DESK)?;
    let date = match query.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => state.today(),
    };
    let queue = Appointment::clinic_queue(&state.pool, auth.require_clinic_id()?, date).await?;
    ok(queue)
}

/// Move a queued patient along: check in, complete or cancel.
async fn update_queue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<QueueUpdate>,
) -> ApiResult<Appointment> {
    auth.authorize(CLINIC_DESK)?;
    let clinic_id = auth.require_clinic_id()?;
    let to = AppointmentStatus::parse(&body.status)?;

    let appointment = Appointment::find_row(&state.pool, appointment_id)
        .await?
        .filter(|a| a.clinic_id == Some(clinic_id))
        .ok_or_else(|| ApiError::not_found("Appointment"))?;

    let updated = Appointment::transition(&state.pool, &appointment, to, body.notes.as_deref()).await?;
    tracing::info!(appointment_id = %updated.id, status = %to, "queue updated");
    ok_with(updated, format!("Appointment marked {to}"))
}
