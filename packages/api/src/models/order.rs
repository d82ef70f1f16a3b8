//! # Pharmacy orders
//!
//! Checkout turns the patient's cart into an order inside one transaction:
//! cart lines are read together with their medicine rows locked
//! `FOR UPDATE`, stock is verified and decremented, the order and its items
//! are inserted at the current prices and the cart is emptied. Cancelling an
//! order puts the quantities back on the shelf in the same transaction as
//! the status change.

use chrono::{DateTime, Utc};
use domain::pricing::checkout_total;
use domain::{CartLine, Lifecycle, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub total_amount: Decimal,
    pub status: String,
    pub shipping_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub patient_name: String,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Checkout {
    pub shipping_address: Option<String>,
}

#[derive(Debug, FromRow)]
struct LockedLine {
    medicine_id: Uuid,
    name: String,
    price: Decimal,
    quantity: i32,
    stock: i32,
    is_active: bool,
}

const DETAILS_SELECT: &str = r#"
    SELECT o.*, u.name AS patient_name
    FROM orders o
    JOIN patients p ON p.id = o.patient_id
    JOIN users u ON u.id = p.user_id
"#;

impl Order {
    pub async fn checkout(
        pool: &PgPool,
        patient_id: Uuid,
        input: &Checkout,
    ) -> Result<OrderDetails, ApiError> {
        let mut tx = pool.begin().await?;

        let locked: Vec<LockedLine> = sqlx::query_as(
            r#"
            SELECT c.medicine_id, m.name, m.price, c.quantity, m.stock, m.is_active
            FROM cart_items c
            JOIN medicines m ON m.id = c.medicine_id
            WHERE c.patient_id = $1
            ORDER BY m.id
            FOR UPDATE OF m
            "#,
        )
        .bind(patient_id)
        .fetch_all(&mut *tx)
        .await?;

        if let Some(line) = locked.iter().find(|l| !l.is_active) {
            return Err(ApiError::conflict(format!("{} is no longer available", line.name)));
        }

        let lines: Vec<CartLine> = locked
            .iter()
            .map(|l| CartLine {
                name: l.name.clone(),
                unit_price: l.price,
                quantity: l.quantity,
                stock: l.stock,
            })
            .collect();
        let total = checkout_total(&lines)?;

        let order: Order = sqlx::query_as(
            r#"
            INSERT INTO orders (patient_id, total_amount, shipping_address)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(patient_id)
        .bind(total)
        .bind(input.shipping_address.as_deref().map(str::trim))
        .fetch_one(&mut *tx)
        .await?;

        for line in &locked {
            sqlx::query("UPDATE medicines SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
                .bind(line.medicine_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, medicine_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id)
            .bind(line.medicine_id)
            .bind(line.quantity)
            .bind(line.price)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE patient_id = $1")
            .bind(patient_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "order placed");

        Self::find(pool, order.id)
            .await?
            .ok_or_else(|| ApiError::not_found("Order"))
    }

    pub async fn find_row(pool: &PgPool, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<OrderDetails>, sqlx::Error> {
        let details: Option<OrderDetails> = sqlx::query_as(&format!("{DETAILS_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        match details {
            Some(mut details) => {
                details.items = items(pool, id).await?;
                Ok(Some(details))
            }
            None => Ok(None),
        }
    }

    pub async fn for_patient(pool: &PgPool, patient_id: Uuid) -> Result<Vec<OrderDetails>, sqlx::Error> {
        let rows: Vec<OrderDetails> = sqlx::query_as(&format!(
            "{DETAILS_SELECT} WHERE o.patient_id = $1 ORDER BY o.created_at DESC"
        ))
        .bind(patient_id)
        .fetch_all(pool)
        .await?;
        with_items(pool, rows).await
    }

    /// Every order, optionally by status, for the pharmacy desk.
    pub async fn list(pool: &PgPool, status: Option<OrderStatus>) -> Result<Vec<OrderDetails>, sqlx::Error> {
        let rows: Vec<OrderDetails> = sqlx::query_as(&format!(
            "{DETAILS_SELECT} WHERE ($1::TEXT IS NULL OR o.status = $1) ORDER BY o.created_at DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await?;
        with_items(pool, rows).await
    }

    /// Apply a status change, restoring stock when the order is cancelled.
    pub async fn transition(pool: &PgPool, id: Uuid, to: OrderStatus) -> Result<Order, ApiError> {
        let mut tx = pool.begin().await?;

        let current: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Order"))?;
        OrderStatus::parse(&current.status)?.transition(to)?;

        if to.restores_stock() {
            sqlx::query(
                r#"
                UPDATE medicines m
                SET stock = m.stock + oi.quantity, updated_at = NOW()
                FROM order_items oi
                WHERE oi.order_id = $1 AND oi.medicine_id = m.id
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let updated: Order = sqlx::query_as(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(order_id = %id, status = %to, "order status changed");
        Ok(updated)
    }
}

async fn items(pool: &PgPool, order_id: Uuid) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT oi.id, oi.order_id, oi.medicine_id, m.name AS medicine_name, oi.quantity, oi.unit_price
        FROM order_items oi
        JOIN medicines m ON m.id = oi.medicine_id
        WHERE oi.order_id = $1
        ORDER BY m.name
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
}

async fn with_items(pool: &PgPool, rows: Vec<OrderDetails>) -> Result<Vec<OrderDetails>, sqlx::Error> {
    let mut out = Vec::with_capacity(rows.len());
    for mut details in rows {
        details.items = items(pool, details.order.id).await?;
        out.push(details);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fixtures, Cart, Medicine};
    use axum::http::StatusCode;

    async fn stock(pool: &PgPool, id: Uuid) -> i32 {
        let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM medicines WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap();
        stock
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_checkout_moves_cart_into_order(pool: PgPool) {
        let patient = fixtures::patient(&pool, "asha").await;
        let paracetamol = fixtures::medicine(&pool, "Paracetamol", Decimal::new(1250, 2), 10).await;
        let cetirizine = fixtures::medicine(&pool, "Cetirizine", Decimal::new(399, 2), 5).await;
        Cart::add(&pool, patient.id, paracetamol.id, 3).await.unwrap();
        Cart::add(&pool, patient.id, cetirizine.id, 2).await.unwrap();

        let input = Checkout {
            shipping_address: Some("  12 Lake Road ".into()),
        };
        let placed = Order::checkout(&pool, patient.id, &input).await.unwrap();

        assert_eq!(placed.order.total_amount, Decimal::new(4548, 2));
        assert_eq!(placed.order.status, "pending");
        assert_eq!(placed.order.shipping_address.as_deref(), Some("12 Lake Road"));
        assert_eq!(placed.items.len(), 2);
        assert_eq!(stock(&pool, paracetamol.id).await, 7);
        assert_eq!(stock(&pool, cetirizine.id).await, 3);
        assert!(Cart::load(&pool, patient.id).await.unwrap().items.is_empty());

        // Later price changes do not touch the order.
        sqlx::query("UPDATE medicines SET price = 99 WHERE id = $1")
            .bind(paracetamol.id)
            .execute(&pool)
            .await
            .unwrap();
        let reloaded = Order::find(&pool, placed.order.id).await.unwrap().unwrap();
        let line = reloaded
            .items
            .iter()
            .find(|i| i.medicine_id == paracetamol.id)
            .unwrap();
        assert_eq!(line.unit_price, Decimal::new(1250, 2));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_short_stock_aborts_checkout(pool: PgPool) {
        let patient = fixtures::patient(&pool, "asha").await;
        let insulin = fixtures::medicine(&pool, "Insulin", Decimal::new(45000, 2), 4).await;
        Cart::add(&pool, patient.id, insulin.id, 4).await.unwrap();
        sqlx::query("UPDATE medicines SET stock = 1 WHERE id = $1")
            .bind(insulin.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = Order::checkout(&pool, patient.id, &Checkout::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_and_message().0, StatusCode::CONFLICT);
        assert_eq!(stock(&pool, insulin.id).await, 1);
        assert_eq!(Cart::load(&pool, patient.id).await.unwrap().items.len(), 1);
        assert!(Order::for_patient(&pool, patient.id).await.unwrap().is_empty());

        Cart::clear(&pool, patient.id).await.unwrap();
        let err = Order::checkout(&pool, patient.id, &Checkout::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_and_message().0, StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_cancel_restores_stock(pool: PgPool) {
        let patient = fixtures::patient(&pool, "asha").await;
        let amoxicillin = fixtures::medicine(&pool, "Amoxicillin", Decimal::new(800, 2), 20).await;
        Cart::add(&pool, patient.id, amoxicillin.id, 6).await.unwrap();
        let placed = Order::checkout(&pool, patient.id, &Checkout::default())
            .await
            .unwrap();
        assert_eq!(stock(&pool, amoxicillin.id).await, 14);

        Order::transition(&pool, placed.order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(stock(&pool, amoxicillin.id).await, 14);

        let cancelled = Order::transition(&pool, placed.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, "cancelled");
        assert_eq!(stock(&pool, amoxicillin.id).await, 20);

        // A terminal order cannot be cancelled twice.
        let err = Order::transition(&pool, placed.order.id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert_eq!(err.status_and_message().0, StatusCode::CONFLICT);
        assert_eq!(stock(&pool, amoxicillin.id).await, 20);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_withdrawn_medicine_keeps_order_history(pool: PgPool) {
        let patient = fixtures::patient(&pool, "asha").await;
        let syrup = fixtures::medicine(&pool, "Cough syrup", Decimal::new(550, 2), 8).await;
        Cart::add(&pool, patient.id, syrup.id, 1).await.unwrap();
        let placed = Order::checkout(&pool, patient.id, &Checkout::default())
            .await
            .unwrap();
        Cart::add(&pool, patient.id, syrup.id, 2).await.unwrap();

        assert!(Medicine::deactivate(&pool, syrup.id).await.unwrap());
        assert!(!Medicine::deactivate(&pool, syrup.id).await.unwrap());
        assert!(Medicine::find(&pool, syrup.id).await.unwrap().is_none());
        assert!(Cart::load(&pool, patient.id).await.unwrap().items.is_empty());

        let history = Order::find(&pool, placed.order.id).await.unwrap().unwrap();
        assert_eq!(history.items[0].medicine_name, "Cough syrup");

        let err = sqlx::query("DELETE FROM medicines WHERE id = $1")
            .bind(syrup.id)
            .execute(&pool)
            .await
            .unwrap_err();
        assert_eq!(ApiError::from(err).status_and_message().0, StatusCode::CONFLICT);
    }
}
