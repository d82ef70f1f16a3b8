//! Pharmacy catalogue.
//!
//! Ordered medicines are referenced by `order_items`, so removing one only
//! clears `is_active`. Inactive medicines drop out of the catalogue and of
//! every cart.

use chrono::{DateTime, Utc};
use domain::Pagination;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::search_pattern;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Medicine {
    pub id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub name: String,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub requires_prescription: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub requires_prescription: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub in_stock: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Medicine {
    pub async fn create(
        pool: &PgPool,
        clinic_id: Option<Uuid>,
        name: &str,
        price: Decimal,
        input: &MedicineInput,
    ) -> Result<Medicine, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO medicines (
                clinic_id, name, category, manufacturer, description,
                price, stock, requires_prescription
            )
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 0), COALESCE($8, FALSE))
            RETURNING *
            "#,
        )
        .bind(clinic_id)
        .bind(name)
        .bind(&input.category)
        .bind(&input.manufacturer)
        .bind(&input.description)
        .bind(price)
        .bind(input.stock)
        .bind(input.requires_prescription)
        .fetch_one(pool)
        .await
    }

    /// An active medicine by id.
    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Medicine>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM medicines WHERE id = $1 AND is_active")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &MedicineFilter,
    ) -> Result<(Vec<Medicine>, i64), sqlx::Error> {
        let page = Pagination::new(filter.page, filter.limit);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM medicines m WHERE m.is_active");
        push_filters(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT m.* FROM medicines m WHERE m.is_active");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY m.name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query.build_query_as().fetch_all(pool).await?;

        Ok((items, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        price: Option<Decimal>,
        input: &MedicineInput,
    ) -> Result<Option<Medicine>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE medicines
            SET name = COALESCE($2, name),
                category = COALESCE($3, category),
                manufacturer = COALESCE($4, manufacturer),
                description = COALESCE($5, description),
                price = COALESCE($6, price),
                stock = COALESCE($7, stock),
                requires_prescription = COALESCE($8, requires_prescription),
                updated_at = NOW()
            WHERE id = $1 AND is_active
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.category)
        .bind(&input.manufacturer)
        .bind(&input.description)
        .bind(price)
        .bind(input.stock)
        .bind(input.requires_prescription)
        .fetch_optional(pool)
        .await
    }

    /// Take a medicine off sale and out of every cart.
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            "UPDATE medicines SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        sqlx::query("DELETE FROM cart_items WHERE medicine_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn categories(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT category FROM medicines WHERE is_active AND category IS NOT NULL ORDER BY category",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &MedicineFilter) {
    if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
        query
            .push(" AND (m.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR m.manufacturer ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = filter
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        query
            .push(" AND LOWER(m.category) = LOWER(")
            .push_bind(category.to_string())
            .push(")");
    }
    if filter.in_stock == Some(true) {
        query.push(" AND m.stock > 0");
    }
}
