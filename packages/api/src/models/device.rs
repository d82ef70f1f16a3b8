//! Health devices paired by a patient (glucometers, BP cuffs, wearables).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Device {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub device_type: String,
    pub serial_number: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub device_type: String,
    pub serial_number: String,
}

impl NewDevice {
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("name", &self.name),
            ("device_type", &self.device_type),
            ("serial_number", &self.serial_number),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        Ok(())
    }
}

impl Device {
    pub async fn create(pool: &PgPool, patient_id: Uuid, input: &NewDevice) -> Result<Device, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO devices (patient_id, name, device_type, serial_number)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(patient_id)
        .bind(input.name.trim())
        .bind(input.device_type.trim().to_lowercase())
        .bind(input.serial_number.trim())
        .fetch_one(pool)
        .await
    }

    pub async fn for_patient(pool: &PgPool, patient_id: Uuid) -> Result<Vec<Device>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM devices WHERE patient_id = $1 ORDER BY created_at")
            .bind(patient_id)
            .fetch_all(pool)
            .await
    }

    pub async fn mark_synced(pool: &PgPool, id: Uuid, patient_id: Uuid) -> Result<Option<Device>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE devices SET last_synced_at = NOW()
            WHERE id = $1 AND patient_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patient_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, patient_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM devices WHERE id = $1 AND patient_id = $2")
            .bind(id)
            .bind(patient_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
