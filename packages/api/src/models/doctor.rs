//! Doctor profiles and working schedules.

use chrono::{DateTime, NaiveTime, Utc};
use domain::slots::{parse_slot_time, DEFAULT_SLOT_MINUTES};
use domain::{Pagination, SlotError, WeekdaySet, WorkingHours};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::search_pattern;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: i32,
    pub consultation_fee: Decimal,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i32,
    pub available_days: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Doctor joined with account and clinic names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DoctorProfile {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub doctor: Doctor,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub clinic_name: Option<String>,
}

/// Profile fields a doctor (or the owning clinic admin) may set.
///
/// Times accept any form [`parse_slot_time`] understands.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub consultation_fee: Option<Decimal>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub slot_minutes: Option<u32>,
    pub available_days: Option<String>,
    pub bio: Option<String>,
}

/// A validated schedule ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i32,
    pub available_days: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorFilter {
    pub specialization: Option<String>,
    pub clinic_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

const PROFILE_SELECT: &str = r#"
    SELECT d.*, u.name, u.email, u.phone, u.avatar_url, c.name AS clinic_name
    FROM doctors d
    JOIN users u ON u.id = d.user_id
    LEFT JOIN clinics c ON c.id = d.clinic_id
"#;

impl Doctor {
    pub fn working_hours(&self) -> Result<WorkingHours, SlotError> {
        let minutes = u32::try_from(self.slot_minutes).map_err(|_| SlotError::InvalidLength)?;
        WorkingHours::new(
            self.start_time,
            self.end_time,
            minutes,
            self.available_days.parse()?,
        )
    }

    pub async fn create(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        clinic_id: Option<Uuid>,
        input: &DoctorInput,
        schedule: &Schedule,
    ) -> Result<Doctor, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO doctors (
                user_id, clinic_id, specialization, qualification, experience_years,
                consultation_fee, start_time, end_time, slot_minutes, available_days, bio
            )
            VALUES ($1, $2, COALESCE($3, 'General'), $4, COALESCE($5, 0), COALESCE($6, 0),
                    $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(clinic_id)
        .bind(input.specialization.as_deref().map(str::trim))
        .bind(&input.qualification)
        .bind(input.experience_years)
        .bind(input.consultation_fee)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.slot_minutes)
        .bind(&schedule.available_days)
        .bind(&input.bio)
        .fetch_one(db)
        .await
    }

    pub async fn find_row(pool: &PgPool, id: Uuid) -> Result<Option<Doctor>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<DoctorProfile>, sqlx::Error> {
        sqlx::query_as(&format!("{PROFILE_SELECT} WHERE d.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &DoctorFilter,
    ) -> Result<(Vec<DoctorProfile>, i64), sqlx::Error> {
        let page = Pagination::new(filter.page, filter.limit);

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM doctors d JOIN users u ON u.id = d.user_id WHERE u.is_active",
        );
        push_filters(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(PROFILE_SELECT);
        query.push(" WHERE u.is_active");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY u.name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query.build_query_as().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn list_by_clinic(
        pool: &PgPool,
        clinic_id: Uuid,
    ) -> Result<Vec<DoctorProfile>, sqlx::Error> {
        sqlx::query_as(&format!("{PROFILE_SELECT} WHERE d.clinic_id = $1 ORDER BY u.name"))
            .bind(clinic_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        input: &DoctorInput,
        schedule: &Schedule,
    ) -> Result<DoctorProfile, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let doctor: Doctor = sqlx::query_as(
            r#"
            UPDATE doctors
            SET specialization = COALESCE($2, specialization),
                qualification = COALESCE($3, qualification),
                experience_years = COALESCE($4, experience_years),
                consultation_fee = COALESCE($5, consultation_fee),
                start_time = $6,
                end_time = $7,
                slot_minutes = $8,
                available_days = $9,
                bio = COALESCE($10, bio),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.specialization.as_deref().map(str::trim))
        .bind(&input.qualification)
        .bind(input.experience_years)
        .bind(input.consultation_fee)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.slot_minutes)
        .bind(&schedule.available_days)
        .bind(&input.bio)
        .fetch_one(&mut *tx)
        .await?;

        super::User::update_profile(
            &mut *tx,
            doctor.user_id,
            input.name.as_deref(),
            input.phone.as_deref(),
        )
        .await?;

        tx.commit().await?;

        Self::find(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Deactivate a clinic's doctor. The login stops working and the doctor
    /// leaves the public listing; appointments, prescriptions and lab orders
    /// keep pointing at the row.
    pub async fn deactivate_in_clinic(
        pool: &PgPool,
        id: Uuid,
        clinic_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET is_active = FALSE, updated_at = NOW()
            WHERE id = (SELECT user_id FROM doctors WHERE id = $1 AND clinic_id = $2)
              AND is_active
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl DoctorInput {
    /// Merge the submitted schedule fields over `current` and validate the result.
    pub fn schedule(&self, current: Option<&Doctor>) -> Result<Schedule, SlotError> {
        let start = match (&self.start_time, current) {
            (Some(value), _) => parse_slot_time(value)?,
            (None, Some(doctor)) => doctor.start_time,
            (None, None) => default_time(9)?,
        };
        let end = match (&self.end_time, current) {
            (Some(value), _) => parse_slot_time(value)?,
            (None, Some(doctor)) => doctor.end_time,
            (None, None) => default_time(17)?,
        };
        let minutes = match (self.slot_minutes, current) {
            (Some(minutes), _) => minutes,
            (None, Some(doctor)) => {
                u32::try_from(doctor.slot_minutes).map_err(|_| SlotError::InvalidLength)?
            }
            (None, None) => DEFAULT_SLOT_MINUTES,
        };
        let days: WeekdaySet = match (&self.available_days, current) {
            (Some(value), _) => value.parse()?,
            (None, Some(doctor)) => doctor.available_days.parse()?,
            (None, None) => "Mon,Tue,Wed,Thu,Fri".parse()?,
        };

        let hours = WorkingHours::new(start, end, minutes, days)?;
        Ok(Schedule {
            start_time: hours.start,
            end_time: hours.end,
            slot_minutes: i32::try_from(hours.slot_minutes).map_err(|_| SlotError::InvalidLength)?,
            available_days: hours.days.to_string(),
        })
    }
}

fn default_time(hour: u32) -> Result<NaiveTime, SlotError> {
    NaiveTime::from_hms_opt(hour, 0, 0).ok_or(SlotError::InvalidTime(hour.to_string()))
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &DoctorFilter) {
    if let Some(specialization) = filter
        .specialization
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        query
            .push(" AND LOWER(d.specialization) = LOWER(")
            .push_bind(specialization.to_string())
            .push(")");
    }
    if let Some(clinic_id) = filter.clinic_id {
        query.push(" AND d.clinic_id = ").push_bind(clinic_id);
    }
    if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
        query
            .push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.specialization ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::{fixtures, Appointment, NewAppointment, Patient, Prescription, User};
    use axum::http::StatusCode;

    fn doctor() -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            clinic_id: None,
            specialization: "Cardiology".into(),
            qualification: None,
            experience_years: 4,
            consultation_fee: Decimal::new(50000, 2),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            slot_minutes: 20,
            available_days: "Mon,Wed".into(),
            bio: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_schedule() {
        let schedule = DoctorInput::default().schedule(None).unwrap();
        assert_eq!(schedule.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(schedule.end_time, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(schedule.slot_minutes, 30);
        assert_eq!(schedule.available_days, "Mon,Tue,Wed,Thu,Fri");
    }

    #[test]
    fn test_partial_update_keeps_current_values() {
        let input = DoctorInput {
            end_time: Some("1:00 PM".into()),
            ..DoctorInput::default()
        };
        let schedule = input.schedule(Some(&doctor())).unwrap();
        assert_eq!(schedule.start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(schedule.end_time, NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        assert_eq!(schedule.slot_minutes, 20);
        assert_eq!(schedule.available_days, "Mon,Wed");
    }

    #[test]
    fn test_rejects_inverted_hours() {
        let input = DoctorInput {
            start_time: Some("18:00".into()),
            end_time: Some("09:00".into()),
            ..DoctorInput::default()
        };
        assert!(input.schedule(None).is_err());
    }

    #[test]
    fn test_working_hours_from_row() {
        let hours = doctor().working_hours().unwrap();
        assert_eq!(hours.slot_minutes, 20);
        assert_eq!(hours.slots_on(chrono::NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()).len(), 6);
    }

    async fn book(pool: &PgPool, doctor_id: Uuid, patient_id: Uuid, time: &str) -> Result<Appointment, ApiError> {
        let input = NewAppointment {
            doctor_id,
            appointment_date: chrono::NaiveDate::from_ymd_opt(2031, 3, 3).unwrap(),
            appointment_time: time.into(),
            reason: None,
            patient_id: None,
        };
        Appointment::create(pool, patient_id, None, &input, time).await
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_removed_doctor_keeps_history(pool: PgPool) {
        let clinic = fixtures::clinic(&pool, "riverside").await;
        let rao = fixtures::doctor(&pool, Some(clinic.id), "dr-rao").await;
        let asha = fixtures::patient(&pool, "asha").await;
        let ben = fixtures::patient(&pool, "ben").await;

        let visit = book(&pool, rao.id, asha.id, "10:00 AM").await.unwrap();
        book(&pool, rao.id, ben.id, "10:30 AM").await.unwrap();
        let input = serde_json::from_value(serde_json::json!({
            "patient_id": ben.id,
            "diagnosis": "Hypertension",
            "lab_tests": [{"test_name": "Lipid panel"}]
        }))
        .unwrap();
        let prescription = Prescription::create(&pool, rao.id, Some(clinic.id), &input)
            .await
            .unwrap();

        let elsewhere = fixtures::clinic(&pool, "hilltop").await;
        assert!(!Doctor::deactivate_in_clinic(&pool, rao.id, elsewhere.id).await.unwrap());
        assert!(Doctor::deactivate_in_clinic(&pool, rao.id, clinic.id).await.unwrap());
        assert!(!Doctor::deactivate_in_clinic(&pool, rao.id, clinic.id).await.unwrap());

        assert!(Appointment::find(&pool, visit.id).await.unwrap().is_some());
        assert!(Prescription::find(&pool, prescription.prescription.id).await.unwrap().is_some());
        assert_eq!(
            fixtures::count(&pool, "SELECT COUNT(*) FROM lab_orders WHERE doctor_id = $1", rao.id).await,
            1
        );
        assert!(!User::find_by_id(&pool, rao.user_id).await.unwrap().unwrap().is_active);

        let (listed, total) = Doctor::list(&pool, &DoctorFilter::default()).await.unwrap();
        assert_eq!(total, 0);
        assert!(listed.is_empty());
        let err = book(&pool, rao.id, asha.id, "11:00 AM").await.unwrap_err();
        assert_eq!(err.status_and_message().0, StatusCode::NOT_FOUND);

        // Clinical rows block a hard delete of the account.
        let err = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(rao.user_id)
            .execute(&pool)
            .await
            .unwrap_err();
        assert_eq!(ApiError::from(err).status_and_message().0, StatusCode::CONFLICT);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_removed_patient_keeps_records(pool: PgPool) {
        let rao = fixtures::doctor(&pool, None, "dr-rao").await;
        let asha = fixtures::patient(&pool, "asha").await;
        let visit = book(&pool, rao.id, asha.id, "10:00 AM").await.unwrap();

        assert!(Patient::deactivate(&pool, asha.id).await.unwrap());
        assert!(!Patient::deactivate(&pool, asha.id).await.unwrap());
        assert!(!User::find_by_id(&pool, asha.user_id).await.unwrap().unwrap().is_active);
        assert!(Appointment::find(&pool, visit.id).await.unwrap().is_some());
        assert!(Patient::find(&pool, asha.id).await.unwrap().is_some());
    }
}
