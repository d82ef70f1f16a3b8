//! Medication and follow-up reminders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub remind_at: DateTime<Utc>,
    pub repeat: String,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub remind_at: Option<DateTime<Utc>>,
    pub repeat: Option<String>,
}

pub const REPEATS: [&str; 4] = ["none", "daily", "weekly", "monthly"];

/// Normalize a repeat value, rejecting unknown ones.
pub fn parse_repeat(value: &str) -> Result<String, String> {
    let value = value.trim().to_lowercase();
    if REPEATS.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(format!("unknown repeat: {value}"))
    }
}

impl Reminder {
    pub async fn create(
        pool: &PgPool,
        patient_id: Uuid,
        title: &str,
        remind_at: DateTime<Utc>,
        repeat: &str,
        description: Option<&str>,
    ) -> Result<Reminder, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO reminders (patient_id, title, description, remind_at, repeat)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(patient_id)
        .bind(title)
        .bind(description)
        .bind(remind_at)
        .bind(repeat)
        .fetch_one(pool)
        .await
    }

    /// Open reminders first, each group by time.
    pub async fn for_patient(pool: &PgPool, patient_id: Uuid) -> Result<Vec<Reminder>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM reminders WHERE patient_id = $1 ORDER BY is_done, remind_at",
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        patient_id: Uuid,
        input: &ReminderInput,
        repeat: Option<&str>,
    ) -> Result<Option<Reminder>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE reminders
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                remind_at = COALESCE($5, remind_at),
                repeat = COALESCE($6, repeat),
                updated_at = NOW()
            WHERE id = $1 AND patient_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patient_id)
        .bind(input.title.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.remind_at)
        .bind(repeat)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_done(
        pool: &PgPool,
        id: Uuid,
        patient_id: Uuid,
        done: bool,
    ) -> Result<Option<Reminder>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE reminders SET is_done = $3, updated_at = NOW()
            WHERE id = $1 AND patient_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patient_id)
        .bind(done)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, patient_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1 AND patient_id = $2")
            .bind(id)
            .bind(patient_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeat() {
        assert_eq!(parse_repeat("Daily").unwrap(), "daily");
        assert!(parse_repeat("hourly").is_err());
    }
}
