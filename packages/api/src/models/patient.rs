//! Patient profiles.

use chrono::{DateTime, NaiveDate, Utc};
use domain::Pagination;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::search_pattern;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Patient row joined with the account's contact fields.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PatientProfile {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub patient: Patient,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatient {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
}

/// Which patients a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientScope {
    All,
    /// Registered with the clinic or booked there at least once.
    Clinic(Uuid),
    /// Booked with the doctor at least once.
    Doctor(Uuid),
}

const PROFILE_SELECT: &str = r#"
    SELECT p.*, u.name, u.email, u.phone
    FROM patients p
    JOIN users u ON u.id = p.user_id
"#;

impl Patient {
    /// Return the user's patient row, creating an empty one when missing.
    pub async fn ensure_for_user(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Patient, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO patients (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = patients.updated_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM patients WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<PatientProfile>, sqlx::Error> {
        sqlx::query_as(&format!("{PROFILE_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        scope: PatientScope,
        search: Option<&str>,
        page: Pagination,
    ) -> Result<(Vec<PatientProfile>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM patients p JOIN users u ON u.id = p.user_id WHERE TRUE",
        );
        push_filters(&mut count, scope, search);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(PROFILE_SELECT);
        query.push(" WHERE TRUE");
        push_filters(&mut query, scope, search);
        query
            .push(" ORDER BY u.name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query.build_query_as().fetch_all(pool).await?;

        Ok((items, total))
    }

    /// Whether the patient falls inside `scope`.
    pub async fn in_scope(pool: &PgPool, id: Uuid, scope: PatientScope) -> Result<bool, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT EXISTS (SELECT 1 FROM patients p WHERE p.id = ",
        );
        query.push_bind(id);
        push_filters(&mut query, scope, None);
        query.push(")");
        let (exists,): (bool,) = query.build_query_as().fetch_one(pool).await?;
        Ok(exists)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        input: &UpdatePatient,
    ) -> Result<PatientProfile, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let patient: Patient = sqlx::query_as(
            r#"
            UPDATE patients
            SET date_of_birth = COALESCE($2, date_of_birth),
                gender = COALESCE($3, gender),
                blood_group = COALESCE($4, blood_group),
                address = COALESCE($5, address),
                emergency_contact = COALESCE($6, emergency_contact),
                allergies = COALESCE($7, allergies),
                medical_history = COALESCE($8, medical_history),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.date_of_birth)
        .bind(&input.gender)
        .bind(&input.blood_group)
        .bind(&input.address)
        .bind(&input.emergency_contact)
        .bind(&input.allergies)
        .bind(&input.medical_history)
        .fetch_one(&mut *tx)
        .await?;

        let user = super::User::update_profile(
            &mut *tx,
            patient.user_id,
            input.name.as_deref(),
            input.phone.as_deref(),
        )
        .await?;

        tx.commit().await?;

        Ok(PatientProfile {
            patient,
            name: user.name,
            email: user.email,
            phone: user.phone,
        })
    }

    /// Disable the patient's login. Medical records stay in place.
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET is_active = FALSE, updated_at = NOW()
            WHERE id = (SELECT user_id FROM patients WHERE id = $1) AND is_active
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, scope: PatientScope, search: Option<&str>) {
    match scope {
        PatientScope::All => {}
        PatientScope::Clinic(clinic_id) => {
            query
                .push(" AND (p.clinic_id = ")
                .push_bind(clinic_id)
                .push(" OR EXISTS (SELECT 1 FROM appointments a WHERE a.patient_id = p.id AND a.clinic_id = ")
                .push_bind(clinic_id)
                .push("))");
        }
        PatientScope::Doctor(doctor_id) => {
            query
                .push(" AND EXISTS (SELECT 1 FROM appointments a WHERE a.patient_id = p.id AND a.doctor_id = ")
                .push_bind(doctor_id)
                .push(")");
        }
    }
    if let Some(pattern) = search.and_then(search_pattern) {
        query
            .push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
