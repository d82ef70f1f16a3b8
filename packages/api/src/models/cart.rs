//! A patient's shopping cart.

use domain::pricing::{self, validate_quantity};
use domain::CartLine;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::ApiError;

/// One cart line priced at the medicine's current price.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartEntry {
    pub medicine_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub stock: i32,
    pub requires_prescription: bool,
}

impl CartEntry {
    pub fn line(&self) -> CartLine {
        CartLine {
            name: self.name.clone(),
            unit_price: self.price,
            quantity: self.quantity,
            stock: self.stock,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartEntry>,
    pub item_count: i32,
    pub total: Decimal,
}

impl Cart {
    pub fn new(items: Vec<CartEntry>) -> Self {
        let lines: Vec<CartLine> = items.iter().map(CartEntry::line).collect();
        Self {
            item_count: items.iter().map(|i| i.quantity).sum(),
            total: pricing::order_total(&lines),
            items,
        }
    }

    pub async fn load(pool: &PgPool, patient_id: Uuid) -> Result<Cart, sqlx::Error> {
        let items = sqlx::query_as(
            r#"
            SELECT c.medicine_id, m.name, m.price, c.quantity, m.stock, m.requires_prescription
            FROM cart_items c
            JOIN medicines m ON m.id = c.medicine_id
            WHERE c.patient_id = $1
            ORDER BY c.created_at
            "#,
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await?;
        Ok(Cart::new(items))
    }

    /// Add `quantity` to the line for `medicine_id`, creating it if needed.
    pub async fn add(
        pool: &PgPool,
        patient_id: Uuid,
        medicine_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, ApiError> {
        validate_quantity(quantity)?;
        let mut tx = pool.begin().await?;

        let current: Option<(i32,)> = sqlx::query_as(
            "SELECT quantity FROM cart_items WHERE patient_id = $1 AND medicine_id = $2 FOR UPDATE",
        )
        .bind(patient_id)
        .bind(medicine_id)
        .fetch_optional(&mut *tx)
        .await?;
        let wanted = validate_quantity(current.map_or(0, |(q,)| q) + quantity)?;
        check_stock(&mut tx, medicine_id, wanted).await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (patient_id, medicine_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (patient_id, medicine_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(patient_id)
        .bind(medicine_id)
        .bind(wanted)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Self::load(pool, patient_id).await?)
    }

    pub async fn set_quantity(
        pool: &PgPool,
        patient_id: Uuid,
        medicine_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, ApiError> {
        validate_quantity(quantity)?;
        let mut tx = pool.begin().await?;
        check_stock(&mut tx, medicine_id, quantity).await?;

        let result = sqlx::query(
            r#"
            UPDATE cart_items SET quantity = $3, updated_at = NOW()
            WHERE patient_id = $1 AND medicine_id = $2
            "#,
        )
        .bind(patient_id)
        .bind(medicine_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Cart item"));
        }

        tx.commit().await?;
        Ok(Self::load(pool, patient_id).await?)
    }

    pub async fn remove(pool: &PgPool, patient_id: Uuid, medicine_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cart_items WHERE patient_id = $1 AND medicine_id = $2")
            .bind(patient_id)
            .bind(medicine_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(pool: &PgPool, patient_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cart_items WHERE patient_id = $1")
            .bind(patient_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn check_stock(
    conn: &mut sqlx::PgConnection,
    medicine_id: Uuid,
    quantity: i32,
) -> Result<(), ApiError> {
    let medicine: Option<(String, Decimal, i32)> =
        sqlx::query_as("SELECT name, price, stock FROM medicines WHERE id = $1 AND is_active")
            .bind(medicine_id)
            .fetch_optional(&mut *conn)
            .await?;
    let (name, unit_price, stock) = medicine.ok_or_else(|| ApiError::not_found("Medicine"))?;
    CartLine {
        name,
        unit_price,
        quantity,
        stock,
    }
    .check_stock()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(price: i64, quantity: i32) -> CartEntry {
        CartEntry {
            medicine_id: Uuid::new_v4(),
            name: "Cetirizine".into(),
            price: Decimal::new(price, 2),
            quantity,
            stock: 50,
            requires_prescription: false,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::new(vec![entry(1250, 2), entry(399, 3)]);
        assert_eq!(cart.item_count, 5);
        assert_eq!(cart.total, Decimal::new(3697, 2));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::new(Vec::new());
        assert_eq!(cart.item_count, 0);
        assert!(cart.total.is_zero());
    }
}
