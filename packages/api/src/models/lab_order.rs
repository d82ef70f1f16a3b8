//! Lab orders and their results.

use chrono::{DateTime, Utc};
use domain::{LabOrderStatus, Lifecycle};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LabOrder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
    pub test_name: String,
    pub priority: String,
    pub status: String,
    pub result: Option<String>,
    pub result_notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LabOrderDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: LabOrder,
    pub patient_name: String,
    pub doctor_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLabOrder {
    pub patient_id: Uuid,
    pub test_name: String,
    pub priority: Option<String>,
    pub prescription_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabResult {
    pub result: String,
    pub result_notes: Option<String>,
}

/// Whose lab orders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabOrderOwner {
    Patient(Uuid),
    Doctor(Uuid),
    Clinic(Uuid),
}

pub const PRIORITIES: [&str; 2] = ["normal", "urgent"];

const DETAILS_SELECT: &str = r#"
    SELECT l.*, pu.name AS patient_name, du.name AS doctor_name
    FROM lab_orders l
    JOIN patients p ON p.id = l.patient_id
    JOIN users pu ON pu.id = p.user_id
    JOIN doctors d ON d.id = l.doctor_id
    JOIN users du ON du.id = d.user_id
"#;

impl LabOrder {
    pub async fn create(
        pool: &PgPool,
        doctor_id: Uuid,
        clinic_id: Option<Uuid>,
        input: &NewLabOrder,
    ) -> Result<LabOrder, ApiError> {
        let priority = input.priority.as_deref().unwrap_or("normal").trim().to_lowercase();
        if !PRIORITIES.contains(&priority.as_str()) {
            return Err(ApiError::bad_request(format!("unknown priority: {priority}")));
        }
        if input.test_name.trim().is_empty() {
            return Err(ApiError::bad_request("Test name is required"));
        }

        let order = sqlx::query_as(
            r#"
            INSERT INTO lab_orders (patient_id, doctor_id, clinic_id, prescription_id, test_name, priority)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(input.patient_id)
        .bind(doctor_id)
        .bind(clinic_id)
        .bind(input.prescription_id)
        .bind(input.test_name.trim())
        .bind(&priority)
        .fetch_one(pool)
        .await?;
        Ok(order)
    }

    pub async fn find_row(pool: &PgPool, id: Uuid) -> Result<Option<LabOrder>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lab_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<LabOrderDetails>, sqlx::Error> {
        sqlx::query_as(&format!("{DETAILS_SELECT} WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Orders for one owner, urgent and oldest first for clinic queues.
    pub async fn list(
        pool: &PgPool,
        owner: LabOrderOwner,
        status: Option<LabOrderStatus>,
    ) -> Result<Vec<LabOrderDetails>, sqlx::Error> {
        let (column, id, order_by) = match owner {
            LabOrderOwner::Patient(id) => ("l.patient_id", id, "l.created_at DESC"),
            LabOrderOwner::Doctor(id) => ("l.doctor_id", id, "l.created_at DESC"),
            LabOrderOwner::Clinic(id) => (
                "l.clinic_id",
                id,
                "(l.priority = 'urgent') DESC, l.created_at",
            ),
        };
        sqlx::query_as(&format!(
            "{DETAILS_SELECT} WHERE {column} = $1 AND ($2::TEXT IS NULL OR l.status = $2) ORDER BY {order_by}"
        ))
        .bind(id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
    }

    pub async fn transition(
        pool: &PgPool,
        current: &LabOrder,
        to: LabOrderStatus,
    ) -> Result<LabOrder, ApiError> {
        let from = LabOrderStatus::parse(&current.status)?;
        from.transition(to)?;

        sqlx::query_as(
            r#"
            UPDATE lab_orders
            SET status = $3,
                completed_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::conflict("Lab order was updated concurrently"))
    }

    /// Record the result and complete the order.
    pub async fn record_result(
        pool: &PgPool,
        current: &LabOrder,
        input: &LabResult,
    ) -> Result<LabOrder, ApiError> {
        if input.result.trim().is_empty() {
            return Err(ApiError::bad_request("Result is required"));
        }
        let from = LabOrderStatus::parse(&current.status)?;
        from.transition(LabOrderStatus::Completed)?;

        sqlx::query_as(
            r#"
            UPDATE lab_orders
            SET status = 'completed', result = $3, result_notes = $4,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(from.as_str())
        .bind(input.result.trim())
        .bind(&input.result_notes)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::conflict("Lab order was updated concurrently"))
    }
}
