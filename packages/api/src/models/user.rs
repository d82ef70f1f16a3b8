//! # Users
//!
//! One row per account regardless of role. The role-specific profile lives in
//! `patients`, `doctors`, `clinics` or `staff` and points back here through
//! `user_id`.
//!
//! [`User`] is the full row and never leaves the server. [`UserInfo`] is the
//! client-safe projection without the password hash.

use chrono::{DateTime, Utc};
use domain::{Role, UnknownRole};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// Full user record from the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub provider: String,
    pub provider_id: Option<String>,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub provider: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new email + password account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub password_hash: String,
}

impl User {
    pub fn role(&self) -> Result<Role, UnknownRole> {
        self.role.parse()
    }

    /// Convert to UserInfo for client consumption.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            role: self.role.clone(),
            provider: self.provider.clone(),
            avatar_url: self.avatar_url.clone(),
            created_at: self.created_at,
        }
    }

    pub async fn find_by_id(db: impl PgExecutor<'_>, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    pub async fn create(db: impl PgExecutor<'_>, new: &NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO users (email, name, phone, role, provider, provider_id, password_hash)
            VALUES ($1, $2, $3, $4, 'local', $1, $5)
            RETURNING *
            "#,
        )
        .bind(normalize_email(&new.email))
        .bind(new.name.trim())
        .bind(&new.phone)
        .bind(new.role.as_str())
        .bind(&new.password_hash)
        .fetch_one(db)
        .await
    }

    /// Find a Google account by email or create it as a patient.
    ///
    /// An existing account keeps its role and provider; only a missing avatar
    /// is filled in.
    pub async fn upsert_google(
        pool: &PgPool,
        email: &str,
        name: &str,
        avatar_url: Option<&str>,
        google_id: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO users (email, name, avatar_url, role, provider, provider_id)
            VALUES ($1, $2, $3, 'patient', 'google', $4)
            ON CONFLICT (email)
            DO UPDATE SET
                avatar_url = COALESCE(users.avatar_url, EXCLUDED.avatar_url),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(normalize_email(email))
        .bind(name)
        .bind(avatar_url)
        .bind(google_id)
        .fetch_one(pool)
        .await
    }

    pub async fn update_profile(
        db: impl PgExecutor<'_>,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name.map(str::trim))
        .bind(phone)
        .fetch_one(db)
        .await
    }

    pub async fn update_password(pool: &PgPool, id: Uuid, hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Number of accounts per role.
    pub async fn count_by_role(pool: &PgPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
            .fetch_all(pool)
            .await
    }
}

impl UserInfo {
    /// Get display name, falling back to email if name is not set.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ana@example.com".into(),
            name: "Ana".into(),
            phone: None,
            role: "clinic_admin".into(),
            provider: "local".into(),
            provider_id: Some("ana@example.com".into()),
            password_hash: Some("$argon2id$secret".into()),
            avatar_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_info_hides_password() {
        let info = serde_json::to_value(user().to_info()).unwrap();
        assert!(info.get("password_hash").is_none());
        assert_eq!(info["role"], "clinic_admin");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(user().role().unwrap(), Role::ClinicAdmin);
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut info = user().to_info();
        assert_eq!(info.display_name(), "Ana");
        info.name = " ".into();
        assert_eq!(info.display_name(), "ana@example.com");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }
}
