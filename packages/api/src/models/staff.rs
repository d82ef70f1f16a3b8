//! Clinic staff: receptionists, nurses, lab technicians and pharmacists.

use chrono::{DateTime, Utc};
use domain::Role;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Staff {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clinic_id: Uuid,
    pub role: String,
    pub department: Option<String>,
    pub shift: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StaffMember {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub staff: Staff,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStaff {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub shift: Option<String>,
    pub is_active: Option<bool>,
}

const MEMBER_SELECT: &str = r#"
    SELECT s.*, u.name, u.email, u.phone, u.is_active
    FROM staff s
    JOIN users u ON u.id = s.user_id
"#;

impl Staff {
    pub async fn create(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        clinic_id: Uuid,
        role: Role,
        department: Option<&str>,
        shift: Option<&str>,
    ) -> Result<Staff, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO staff (user_id, clinic_id, role, department, shift)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(clinic_id)
        .bind(role.as_str())
        .bind(department)
        .bind(shift)
        .fetch_one(db)
        .await
    }

    pub async fn list(pool: &PgPool, clinic_id: Uuid, role: Option<Role>) -> Result<Vec<StaffMember>, sqlx::Error> {
        sqlx::query_as(&format!(
            "{MEMBER_SELECT} WHERE s.clinic_id = $1 AND ($2::TEXT IS NULL OR s.role = $2) ORDER BY s.role, u.name"
        ))
        .bind(clinic_id)
        .bind(role.map(|r| r.as_str()))
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid, clinic_id: Uuid) -> Result<Option<StaffMember>, sqlx::Error> {
        sqlx::query_as(&format!("{MEMBER_SELECT} WHERE s.id = $1 AND s.clinic_id = $2"))
            .bind(id)
            .bind(clinic_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        clinic_id: Uuid,
        input: &UpdateStaff,
    ) -> Result<Option<StaffMember>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let staff: Option<Staff> = sqlx::query_as(
            r#"
            UPDATE staff
            SET department = COALESCE($3, department),
                shift = COALESCE($4, shift),
                updated_at = NOW()
            WHERE id = $1 AND clinic_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .bind(&input.department)
        .bind(&input.shift)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(staff) = staff else {
            return Ok(None);
        };

        super::User::update_profile(
            &mut *tx,
            staff.user_id,
            input.name.as_deref(),
            input.phone.as_deref(),
        )
        .await?;

        if let Some(active) = input.is_active {
            sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
                .bind(staff.user_id)
                .bind(active)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Self::find(pool, id, clinic_id).await
    }

    /// Disable a staff member's login. `update` with `is_active` turns it back on.
    pub async fn deactivate(pool: &PgPool, id: Uuid, clinic_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET is_active = FALSE, updated_at = NOW()
            WHERE id = (SELECT user_id FROM staff WHERE id = $1 AND clinic_id = $2)
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
