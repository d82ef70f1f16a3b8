//! Clinics, each owned by one clinic admin account.

use chrono::{DateTime, Utc};
use domain::Pagination;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::search_pattern;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Clinic {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Clinic with headcounts for listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClinicSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub clinic: Clinic,
    pub doctor_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClinic {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
}

const SUMMARY_SELECT: &str = r#"
    SELECT c.*,
        (SELECT COUNT(*) FROM doctors d WHERE d.clinic_id = c.id) AS doctor_count
    FROM clinics c
"#;

impl Clinic {
    pub async fn create(
        db: impl PgExecutor<'_>,
        user_id: Uuid,
        name: &str,
    ) -> Result<Clinic, sqlx::Error> {
        sqlx::query_as("INSERT INTO clinics (user_id, name) VALUES ($1, $2) RETURNING *")
            .bind(user_id)
            .bind(name.trim())
            .fetch_one(db)
            .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<ClinicSummary>, sqlx::Error> {
        sqlx::query_as(&format!("{SUMMARY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        city: Option<&str>,
        page: Pagination,
    ) -> Result<(Vec<ClinicSummary>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM clinics c WHERE TRUE");
        push_filters(&mut count, search, city);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        query.push(" WHERE TRUE");
        push_filters(&mut query, search, city);
        query
            .push(" ORDER BY c.name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query.build_query_as().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn update(pool: &PgPool, id: Uuid, input: &UpdateClinic) -> Result<Clinic, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE clinics
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                city = COALESCE($4, city),
                phone = COALESCE($5, phone),
                email = COALESCE($6, email),
                description = COALESCE($7, description),
                opening_time = COALESCE($8, opening_time),
                closing_time = COALESCE($9, closing_time),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.description)
        .bind(&input.opening_time)
        .bind(&input.closing_time)
        .fetch_one(pool)
        .await
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, search: Option<&str>, city: Option<&str>) {
    if let Some(pattern) = search.and_then(search_pattern) {
        query
            .push(" AND (c.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.address ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) {
        query.push(" AND LOWER(c.city) = LOWER(").push_bind(city.to_string()).push(")");
    }
}
