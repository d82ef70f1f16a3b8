use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use domain::slots::{calendar, SlotView};
use domain::{Pagination, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::validate_email;
use super::{parse_date, required};
use crate::auth::{check_strength, hash_password, AuthUser};
use crate::error::ApiError;
use crate::models::{Appointment, Doctor, DoctorFilter, DoctorInput, DoctorProfile, NewUser, User};
use crate::response::{created, done, ok, ok_with, ApiResult, Created, Page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: DoctorInput,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorSlots {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub working_day: bool,
    pub slots: Vec<SlotView>,
    pub available: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/me", get(me).put(update_me))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/slots", get(slots))
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<DoctorFilter>,
) -> ApiResult<Page<DoctorProfile>> {
    let page = Pagination::new(filter.page, filter.limit);
    let (items, total) = Doctor::list(&state.pool, &filter).await?;
    ok(Page::new(items, total, page))
}

async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<DoctorProfile> {
    let doctor = Doctor::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    ok(doctor)
}

/// The day's slots with availability, dropping slots already past.
async fn slots(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> ApiResult<DoctorSlots> {
    let date = parse_date(&query.date)?;
    let doctor = Doctor::find_row(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    let hours = doctor.working_hours()?;
    let booked = Appointment::booked_slots(&state.pool, id, date).await?;

    let slots = calendar(&hours, date, &booked, state.now());
    let available = slots
        .iter()
        .filter(|s| s.available)
        .map(|s| s.time.clone())
        .collect();

    ok(DoctorSlots {
        doctor_id: id,
        date,
        working_day: hours.works_on(date),
        slots,
        available,
    })
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<DoctorProfile> {
    auth.authorize(&[Role::Doctor])?;
    let id = auth.require_doctor_id()?;
    let doctor = Doctor::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    ok(doctor)
}

async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<DoctorInput>,
) -> ApiResult<DoctorProfile> {
    auth.authorize(&[Role::Doctor])?;
    let id = auth.require_doctor_id()?;
    ok_with(save(&state, id, &body).await?, "Profile updated")
}

/// Clinic admin creates a doctor account attached to their clinic.
async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateDoctorRequest>,
) -> Created<DoctorProfile> {
    auth.authorize(&[Role::ClinicAdmin])?;
    let clinic_id = auth.require_clinic_id()?;

    let name = required("name", body.profile.name.as_deref().unwrap_or_default())?;
    validate_email(&body.email)?;
    check_strength(&body.password).map_err(ApiError::BadRequest)?;
    validate_profile(&body.profile)?;
    let schedule = body.profile.schedule(None)?;
    let password_hash = hash_password(&body.password).map_err(ApiError::Internal)?;

    let mut tx = state.pool.begin().await?;
    let user = User::create(
        &mut *tx,
        &NewUser {
            email: body.email.clone(),
            name: name.to_string(),
            phone: body.profile.phone.clone(),
            role: Role::Doctor,
            password_hash,
        },
    )
    .await?;
    let doctor = Doctor::create(&mut *tx, user.id, Some(clinic_id), &body.profile, &schedule).await?;
    tx.commit().await?;

    tracing::info!(doctor_id = %doctor.id, %clinic_id, "doctor account created");
    let profile = Doctor::find(&state.pool, doctor.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    created(profile, "Doctor created")
}

async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DoctorInput>,
) -> ApiResult<DoctorProfile> {
    auth.authorize(&[Role::ClinicAdmin])?;
    let clinic_id = auth.require_clinic_id()?;
    let doctor = Doctor::find_row(&state.pool, id)
        .await?
        .filter(|d| d.clinic_id == Some(clinic_id))
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    ok_with(save(&state, doctor.id, &body).await?, "Doctor updated")
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    auth.authorize(&[Role::ClinicAdmin])?;
    let clinic_id = auth.require_clinic_id()?;
    if !Doctor::deactivate_in_clinic(&state.pool, id, clinic_id).await? {
        return Err(ApiError::not_found("Doctor"));
    }
    tracing::info!(doctor_id = %id, %clinic_id, "doctor deactivated");
    done("Doctor removed")
}

async fn save(state: &AppState, id: Uuid, input: &DoctorInput) -> Result<DoctorProfile, ApiError> {
    validate_profile(input)?;
    let current = Doctor::find_row(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    let schedule = input.schedule(Some(&current))?;
    Ok(Doctor::update(&state.pool, id, input, &schedule).await?)
}

fn validate_profile(input: &DoctorInput) -> Result<(), ApiError> {
    if input.experience_years.is_some_and(|y| y < 0) {
        return Err(ApiError::bad_request("Experience cannot be negative"));
    }
    if let Some(fee) = input.consultation_fee {
        domain::pricing::validate_price(fee)?;
    }
    Ok(())
}
