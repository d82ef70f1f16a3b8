//! Doctors a patient has saved.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Bookmark {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub specialization: String,
    pub clinic_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    pub async fn for_patient(pool: &PgPool, patient_id: Uuid) -> Result<Vec<Bookmark>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT b.id, b.doctor_id, u.name AS doctor_name, d.specialization,
                   c.name AS clinic_name, b.created_at
            FROM bookmarks b
            JOIN doctors d ON d.id = b.doctor_id
            JOIN users u ON u.id = d.user_id
            LEFT JOIN clinics c ON c.id = d.clinic_id
            WHERE b.patient_id = $1
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
    }

    /// Save a doctor; saving twice is a no-op. Returns whether a row was added.
    pub async fn add(pool: &PgPool, patient_id: Uuid, doctor_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO bookmarks (patient_id, doctor_id) VALUES ($1, $2)
            ON CONFLICT (patient_id, doctor_id) DO NOTHING
            "#,
        )
        .bind(patient_id)
        .bind(doctor_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(pool: &PgPool, patient_id: Uuid, doctor_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE patient_id = $1 AND doctor_id = $2")
            .bind(patient_id)
            .bind(doctor_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
