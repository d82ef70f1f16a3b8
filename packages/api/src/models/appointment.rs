//! # Appointments
//!
//! Times are stored as text in the `hh:mm AM` display form produced by
//! [`format_slot_time`], so equality on the column is equality of slots.
//!
//! Booking runs in a transaction that first locks the doctor row. Concurrent
//! bookings for the same doctor therefore queue up behind each other, and the
//! check for an open appointment in the slot sees every committed booking.
//! The partial unique index on `(doctor_id, appointment_date,
//! appointment_time) WHERE status <> 'cancelled'` backs this up.
//!
//! Each booking gets the next `queue_number` for its doctor and day.

use chrono::{DateTime, NaiveDate, Utc};
use domain::slots::format_slot_time;
use domain::{AppointmentStatus, Lifecycle};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub queue_number: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appointment with the names a dashboard shows next to it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppointmentDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub doctor_name: String,
    pub specialization: String,
    pub clinic_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub reason: Option<String>,
    /// Set by clinic staff booking on a patient's behalf.
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Whose appointments to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentOwner {
    Patient(Uuid),
    Doctor(Uuid),
    Clinic(Uuid),
}

const DETAILS_SELECT: &str = r#"
    SELECT a.*,
        pu.name AS patient_name, pu.phone AS patient_phone,
        du.name AS doctor_name, d.specialization,
        c.name AS clinic_name
    FROM appointments a
    JOIN patients p ON p.id = a.patient_id
    JOIN users pu ON pu.id = p.user_id
    JOIN doctors d ON d.id = a.doctor_id
    JOIN users du ON du.id = d.user_id
    LEFT JOIN clinics c ON c.id = a.clinic_id
"#;

impl Appointment {
    pub fn status(&self) -> Result<AppointmentStatus, ApiError> {
        Ok(AppointmentStatus::parse(&self.status)?)
    }

    /// Booked times for a doctor on a date, excluding cancelled appointments,
    /// in display form.
    pub async fn booked_slots(
        pool: &PgPool,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT appointment_time FROM appointments
            WHERE doctor_id = $1 AND appointment_date = $2 AND status <> 'cancelled'
            ORDER BY queue_number
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(time,)| format_slot_time(&time).unwrap_or(time))
            .collect())
    }

    /// Book a slot. `time` must already be in display form.
    pub async fn create(
        pool: &PgPool,
        patient_id: Uuid,
        clinic_id: Option<Uuid>,
        input: &NewAppointment,
        time: &str,
    ) -> Result<Appointment, ApiError> {
        let mut tx = pool.begin().await?;

        lock_doctor(&mut tx, input.doctor_id).await?;
        ensure_slot_free(&mut tx, input.doctor_id, input.appointment_date, time, None).await?;

        let appointment: Appointment = sqlx::query_as(
            r#"
            INSERT INTO appointments (
                patient_id, doctor_id, clinic_id, appointment_date, appointment_time,
                reason, queue_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, (
                SELECT COALESCE(MAX(queue_number), 0) + 1 FROM appointments
                WHERE doctor_id = $2 AND appointment_date = $4
            ))
            RETURNING *
            "#,
        )
        .bind(patient_id)
        .bind(input.doctor_id)
        .bind(clinic_id)
        .bind(input.appointment_date)
        .bind(time)
        .bind(input.reason.as_deref().map(str::trim))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            appointment_id = %appointment.id,
            doctor_id = %appointment.doctor_id,
            queue_number = appointment.queue_number,
            "appointment booked"
        );
        Ok(appointment)
    }

    pub async fn find_row(pool: &PgPool, id: Uuid) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<AppointmentDetails>, sqlx::Error> {
        sqlx::query_as(&format!("{DETAILS_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        owner: AppointmentOwner,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentDetails>, ApiError> {
        let status = filter
            .status
            .as_deref()
            .map(AppointmentStatus::parse)
            .transpose()?;
        let (column, id) = match owner {
            AppointmentOwner::Patient(id) => ("a.patient_id", id),
            AppointmentOwner::Doctor(id) => ("a.doctor_id", id),
            AppointmentOwner::Clinic(id) => ("a.clinic_id", id),
        };
        let sql = format!(
            r#"{DETAILS_SELECT}
            WHERE {column} = $1
              AND ($2::TEXT IS NULL OR a.status = $2)
              AND ($3::DATE IS NULL OR a.appointment_date = $3)
            ORDER BY a.appointment_date DESC, a.queue_number"#
        );
        let rows = sqlx::query_as(&sql)
            .bind(id)
            .bind(status.map(|s| s.as_str()))
            .bind(filter.date)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// A clinic's appointments for one day in queue order.
    pub async fn clinic_queue(
        pool: &PgPool,
        clinic_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentDetails>, sqlx::Error> {
        sqlx::query_as(&format!(
            r#"{DETAILS_SELECT}
            WHERE a.clinic_id = $1 AND a.appointment_date = $2
            ORDER BY du.name, a.queue_number"#
        ))
        .bind(clinic_id)
        .bind(date)
        .fetch_all(pool)
        .await
    }

    /// Move to `to` if the lifecycle allows it from the current status.
    ///
    /// The update is conditional on the status read, so two concurrent
    /// transitions cannot both apply.
    pub async fn transition(
        pool: &PgPool,
        current: &Appointment,
        to: AppointmentStatus,
        notes: Option<&str>,
    ) -> Result<Appointment, ApiError> {
        let from = current.status()?;
        from.transition(to)?;

        let updated: Option<Appointment> = sqlx::query_as(
            r#"
            UPDATE appointments
            SET status = $3, notes = COALESCE($4, notes), updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(notes)
        .fetch_optional(pool)
        .await?;

        updated.ok_or_else(|| ApiError::conflict("Appointment was updated concurrently"))
    }

    /// Move a scheduled appointment to another date or time.
    pub async fn reschedule(
        pool: &PgPool,
        current: &Appointment,
        date: NaiveDate,
        time: &str,
    ) -> Result<Appointment, ApiError> {
        if current.status()? != AppointmentStatus::Scheduled {
            return Err(ApiError::conflict(
                "Only scheduled appointments can be rescheduled",
            ));
        }

        let mut tx = pool.begin().await?;
        lock_doctor(&mut tx, current.doctor_id).await?;
        ensure_slot_free(&mut tx, current.doctor_id, date, time, Some(current.id)).await?;

        let updated: Appointment = sqlx::query_as(
            r#"
            UPDATE appointments
            SET appointment_date = $2,
                appointment_time = $3,
                queue_number = CASE WHEN appointment_date = $2 THEN queue_number ELSE (
                    SELECT COALESCE(MAX(queue_number), 0) + 1 FROM appointments
                    WHERE doctor_id = $4 AND appointment_date = $2
                ) END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(date)
        .bind(time)
        .bind(current.doctor_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::conflict("Appointment was updated concurrently"))?;

        tx.commit().await?;
        Ok(updated)
    }
}

async fn lock_doctor(conn: &mut PgConnection, doctor_id: Uuid) -> Result<(), ApiError> {
    let found: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT d.id FROM doctors d
        JOIN users u ON u.id = d.user_id
        WHERE d.id = $1 AND u.is_active
        FOR UPDATE OF d
        "#,
    )
    .bind(doctor_id)
    .fetch_optional(&mut *conn)
    .await?;
    found.map(|_| ()).ok_or_else(|| ApiError::not_found("Doctor"))
}

async fn ensure_slot_free(
    conn: &mut PgConnection,
    doctor_id: Uuid,
    date: NaiveDate,
    time: &str,
    except: Option<Uuid>,
) -> Result<(), ApiError> {
    let (taken,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM appointments
            WHERE doctor_id = $1 AND appointment_date = $2 AND appointment_time = $3
              AND status <> 'cancelled'
              AND ($4::UUID IS NULL OR id <> $4)
        )
        "#,
    )
    .bind(doctor_id)
    .bind(date)
    .bind(time)
    .bind(except)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        return Err(ApiError::conflict("This time slot is already booked"));
    }
    Ok(())
}
