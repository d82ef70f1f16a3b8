//! Cart and order arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest quantity of a single medicine accepted in one cart line.
pub const MAX_LINE_QUANTITY: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("quantity must be between 1 and 100")]
    InvalidQuantity,
    #[error("only {available} of {name} left in stock")]
    InsufficientStock { name: String, available: i32 },
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("cart is empty")]
    EmptyCart,
}

/// One line of a cart, priced at the medicine's current price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn check_stock(&self) -> Result<(), PricingError> {
        if self.quantity > self.stock {
            return Err(PricingError::InsufficientStock {
                name: self.name.clone(),
                available: self.stock.max(0),
            });
        }
        Ok(())
    }
}

pub fn validate_quantity(quantity: i32) -> Result<i32, PricingError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(PricingError::InvalidQuantity)
    }
}

pub fn validate_price(price: Decimal) -> Result<Decimal, PricingError> {
    if price.is_sign_negative() && !price.is_zero() {
        Err(PricingError::NegativePrice)
    } else {
        Ok(price.round_dp(2))
    }
}

/// Sum of all line totals, rounded to cents.
pub fn order_total(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(CartLine::line_total)
        .sum::<Decimal>()
        .round_dp(2)
}

/// Validate a cart for checkout and return its total.
pub fn checkout_total(lines: &[CartLine]) -> Result<Decimal, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }
    for line in lines {
        validate_quantity(line.quantity)?;
        line.check_stock()?;
    }
    Ok(order_total(lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, cents: i64, quantity: i32, stock: i32) -> CartLine {
        CartLine {
            name: name.to_string(),
            unit_price: Decimal::new(cents, 2),
            quantity,
            stock,
        }
    }

    #[test]
    fn test_line_and_order_totals() {
        let lines = vec![line("Paracetamol", 450, 2, 10), line("Cough syrup", 1299, 1, 3)];
        assert_eq!(lines[0].line_total(), Decimal::new(900, 2));
        assert_eq!(order_total(&lines), Decimal::new(2199, 2));
    }

    #[test]
    fn test_checkout_rejects_empty_and_short_stock() {
        assert_eq!(checkout_total(&[]), Err(PricingError::EmptyCart));

        let err = checkout_total(&[line("Insulin", 2500, 4, 3)]).unwrap_err();
        assert_eq!(err.to_string(), "only 3 of Insulin left in stock");
    }

    #[test]
    fn test_validate_quantity_bounds() {
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert_eq!(validate_quantity(1), Ok(1));
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert_eq!(validate_price(Decimal::new(19999, 3)), Ok(Decimal::new(2000, 2)));
        assert_eq!(validate_price(Decimal::ZERO), Ok(Decimal::ZERO));
        assert_eq!(
            validate_price(Decimal::new(-1, 2)),
            Err(PricingError::NegativePrice)
        );
    }
}
