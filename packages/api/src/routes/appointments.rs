//! Booking and managing appointments.
//!
//! Patients book for themselves; receptionists and clinic admins may book on
//! a patient's behalf at their own clinic. The requested time is normalized
//! to display form and must start one of the doctor's slots on a working day
//! that has not already passed.

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveDateTime};
use domain::slots::{display_time, parse_slot_time};
use domain::{AppointmentStatus, Lifecycle, Role, WorkingHours};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_date, CLINIC_DESK};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentDetails, AppointmentFilter, AppointmentOwner, Doctor, NewAppointment,
};
use crate::response::{created, ok, ok_with, ApiResult, Created};
use crate::state::AppState;

/// Desk roles that may book for a patient.
const BOOKERS: &[Role] = &[Role::ClinicAdmin, Role::Receptionist];

#[derive(Debug, Deserialize)]
pub struct BookedSlotsQuery {
    pub doctor_id: Uuid,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct BookedSlots {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub booked: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Reschedule {
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/me", get(mine))
        .route("/booked-slots", get(booked_slots))
        .route("/{id}", get(show).delete(cancel))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/reschedule", put(reschedule))
}

/// Check that `date`/`time` is a bookable slot and return the stored time form.
pub fn validate_slot(
    hours: &WorkingHours,
    date: NaiveDate,
    time: &str,
    now: NaiveDateTime,
) -> Result<String, ApiError> {
    let time = parse_slot_time(time)?;
    if date.and_time(time) <= now {
        return Err(ApiError::bad_request("Cannot book a time in the past"));
    }
    if !hours.works_on(date) {
        return Err(ApiError::bad_request("Doctor does not work on this day"));
    }
    if !hours.is_slot_start(time) {
        return Err(ApiError::bad_request(
            "Requested time is outside the doctor's schedule",
        ));
    }
    Ok(display_time(time))
}

/// Whether the caller is a party to the appointment.
fn can_access(auth: &AuthUser, appointment: &Appointment) -> bool {
    match auth.role {
        Role::Patient => auth.patient_id == Some(appointment.patient_id),
        Role::Doctor => auth.doctor_id == Some(appointment.doctor_id),
        Role::ClinicAdmin | Role::Receptionist | Role::Nurse => {
            auth.clinic_id.is_some() && auth.clinic_id == appointment.clinic_id
        }
        Role::Admin => true,
        Role::Lab | Role::Pharmacy => false,
    }
}

async fn load_accessible(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> Result<Appointment, ApiError> {
    Appointment::find_row(&state.pool, id)
        .await?
        .filter(|a| can_access(auth, a))
        .ok_or_else(|| ApiError::not_found("Appointment"))
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewAppointment>,
) -> Created<Appointment> {
    let patient_id = match auth.role {
        Role::Patient => auth.require_patient_id()?,
        role if BOOKERS.contains(&role) => body
            .patient_id
            .ok_or_else(|| ApiError::bad_request("patient_id is required"))?,
        _ => return Err(ApiError::forbidden("Access denied")),
    };

    let doctor = Doctor::find_row(&state.pool, body.doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    if BOOKERS.contains(&auth.role) && doctor.clinic_id != Some(auth.require_clinic_id()?) {
        return Err(ApiError::forbidden("Doctor belongs to another clinic"));
    }

    let time = validate_slot(
        &doctor.working_hours()?,
        body.appointment_date,
        &body.appointment_time,
        state.now(),
    )?;

    let appointment =
        Appointment::create(&state.pool, patient_id, doctor.clinic_id, &body, &time).await?;
    created(appointment, "Appointment booked")
}

async fn mine(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<AppointmentFilter>,
) -> ApiResult<Vec<AppointmentDetails>> {
    let owner = match auth.role {
        Role::Patient => AppointmentOwner::Patient(auth.require_patient_id()?),
        Role::Doctor => AppointmentOwner::Doctor(auth.require_doctor_id()?),
        Role::ClinicAdmin | Role::Receptionist | Role::Nurse => {
            AppointmentOwner::Clinic(auth.require_clinic_id()?)
        }
        _ => return Err(ApiError::forbidden("Access denied")),
    };
    ok(Appointment::list(&state.pool, owner, &filter).await?)
}

async fn booked_slots(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<BookedSlotsQuery>,
) -> ApiResult<BookedSlots> {
    let date = parse_date(&query.date)?;
    let booked = Appointment::booked_slots(&state.pool, query.doctor_id, date).await?;
    ok(BookedSlots {
        doctor_id: query.doctor_id,
        date,
        booked,
    })
}

async fn show(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<AppointmentDetails> {
    load_accessible(&state, &auth, id).await?;
    let details = Appointment::find(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment"))?;
    ok(details)
}

async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Appointment> {
    let to = AppointmentStatus::parse(&body.status)?;
    let appointment = load_accessible(&state, &auth, id).await?;
    if auth.is(Role::Patient) && to != AppointmentStatus::Cancelled {
        return Err(ApiError::forbidden("Patients can only cancel appointments"));
    }

    let updated =
        Appointment::transition(&state.pool, &appointment, to, body.notes.as_deref()).await?;
    ok_with(updated, format!("Appointment marked {to}"))
}

async fn reschedule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Reschedule>,
) -> ApiResult<Appointment> {
    let appointment = load_accessible(&state, &auth, id).await?;
    if !(auth.is(Role::Patient) || CLINIC_DESK.contains(&auth.role)) {
        return Err(ApiError::forbidden("Access denied"));
    }

    let doctor = Doctor::find_row(&state.pool, appointment.doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    let time = validate_slot(
        &doctor.working_hours()?,
        body.appointment_date,
        &body.appointment_time,
        state.now(),
    )?;

    let updated =
        Appointment::reschedule(&state.pool, &appointment, body.appointment_date, &time).await?;
    tracing::info!(appointment_id = %id, date = %body.appointment_date, time = %time, "appointment rescheduled");
    ok_with(updated, "Appointment rescheduled")
}

async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Appointment> {
    let appointment = load_accessible(&state, &auth, id).await?;
    let updated = Appointment::transition(
        &state.pool,
        &appointment,
        AppointmentStatus::Cancelled,
        None,
    )
    .await?;
    ok_with(updated, "Appointment cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use domain::WeekdaySet;

    fn hours() -> WorkingHours {
        WorkingHours::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            30,
            "Mon,Tue".parse::<WeekdaySet>().unwrap(),
        )
        .unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn earlier() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_valid_slot_normalized() {
        assert_eq!(
            validate_slot(&hours(), monday(), "10:30", earlier()).unwrap(),
            "10:30 AM"
        );
        assert_eq!(
            validate_slot(&hours(), monday(), "9:00 am", earlier()).unwrap(),
            "09:00 AM"
        );
    }

    #[test]
    fn test_rejects_off_grid_and_off_day() {
        assert!(validate_slot(&hours(), monday(), "10:15", earlier()).is_err());
        assert!(validate_slot(&hours(), monday(), "12:00", earlier()).is_err());
        let wednesday = NaiveDate::from_ymd_opt(2030, 1, 9).unwrap();
        assert!(validate_slot(&hours(), wednesday, "10:00", earlier()).is_err());
    }

    #[test]
    fn test_rejects_past() {
        let now = monday().and_hms_opt(10, 0, 0).unwrap();
        assert!(validate_slot(&hours(), monday(), "09:30", now).is_err());
        assert!(validate_slot(&hours(), monday(), "10:00", now).is_err());
        assert!(validate_slot(&hours(), monday(), "10:30", now).is_ok());
    }

    #[test]
    fn test_access_rules() {
        let patient = Uuid::new_v4();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: Uuid::new_v4(),
            clinic_id: None,
            appointment_date: monday(),
            appointment_time: "10:00 AM".into(),
            status: "scheduled".into(),
            reason: None,
            notes: None,
            queue_number: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let mut auth = AuthUser {
            id: Uuid::new_v4(),
            email: "p@example.com".into(),
            name: "P".into(),
            role: Role::Patient,
            patient_id: Some(patient),
            doctor_id: None,
            clinic_id: None,
        };
        assert!(can_access(&auth, &appointment));

        auth.patient_id = Some(Uuid::new_v4());
        assert!(!can_access(&auth, &appointment));

        // A clinic user without a clinic never matches an appointment without one.
        auth.role = Role::Receptionist;
        assert!(!can_access(&auth, &appointment));
    }
}
