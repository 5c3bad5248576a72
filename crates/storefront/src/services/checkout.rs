//! Order pricing.
//!
//! Turns the SPA's requested items into priced order lines:
//!
//! - duplicate product entries are merged
//! - every line needs a quantity in `1..=99` and an in-stock product
//! - `subtotal = Σ offer_price × quantity`
//! - `tax = subtotal × 2%`, rounded down to cents
//! - `amount = subtotal + tax`
//!
//! Stripe line items are priced per unit with tax folded in:
//! `unit_amount = floor(offer_price × 1.02 × 100)`.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use greencart_core::{CurrencyCode, Price, ProductId};

use crate::models::order::{NewOrderLine, OrderItemInput};
use crate::models::product::Product;

/// Sales tax applied to every order (2%).
pub const TAX_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Largest quantity of one product per order.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Why an order could not be priced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Invalid data")]
    Empty,
    #[error("Quantity for product {0} must be between 1 and 99")]
    InvalidQuantity(ProductId),
    #[error("Product {0} does not exist")]
    UnknownProduct(ProductId),
    #[error("{0} is out of stock")]
    OutOfStock(String),
    #[error("Order total is out of range")]
    Overflow,
}

/// A requested line after merging duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A line with its product and captured price.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product: Product,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A fully priced order.
#[derive(Debug, Clone)]
pub struct OrderQuote {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub amount: Decimal,
}

impl OrderQuote {
    /// Lines in the shape the order repository inserts.
    #[must_use]
    pub fn new_order_lines(&self) -> Vec<NewOrderLine> {
        self.lines
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product.id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect()
    }
}

/// Merge duplicate products and check quantities. Order of first appearance is kept.
///
/// # Errors
///
/// Returns `CheckoutError::Empty` for no items and
/// `CheckoutError::InvalidQuantity` when a (merged) quantity is outside `1..=99`.
pub fn merge_items(items: &[OrderItemInput]) -> Result<Vec<RequestedLine>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::Empty);
    }

    let mut merged: Vec<RequestedLine> = Vec::with_capacity(items.len());
    let mut positions: HashMap<ProductId, usize> = HashMap::new();

    for item in items {
        if item.quantity < 1 || item.quantity > i64::from(MAX_LINE_QUANTITY) {
            return Err(CheckoutError::InvalidQuantity(item.product));
        }
        let quantity =
            i32::try_from(item.quantity).map_err(|_| CheckoutError::InvalidQuantity(item.product))?;

        match positions.get(&item.product).and_then(|&i| merged.get_mut(i)) {
            Some(line) => {
                line.quantity += quantity;
                if line.quantity > MAX_LINE_QUANTITY {
                    return Err(CheckoutError::InvalidQuantity(item.product));
                }
            }
            None => {
                positions.insert(item.product, merged.len());
                merged.push(RequestedLine {
                    product_id: item.product,
                    quantity,
                });
            }
        }
    }

    Ok(merged)
}

/// Tax on a subtotal, rounded down to cents.
#[must_use]
pub fn tax_for(subtotal: Decimal) -> Decimal {
    (subtotal * TAX_RATE).round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Price requested lines against the catalog.
///
/// # Errors
///
/// Returns `CheckoutError::UnknownProduct` or `CheckoutError::OutOfStock`
/// for lines that cannot be sold, `CheckoutError::Overflow` if the total
/// does not fit in a decimal.
pub fn quote(requested: &[RequestedLine], catalog: &[Product]) -> Result<OrderQuote, CheckoutError> {
    if requested.is_empty() {
        return Err(CheckoutError::Empty);
    }

    let by_id: HashMap<ProductId, &Product> = catalog.iter().map(|p| (p.id, p)).collect();

    let mut lines = Vec::with_capacity(requested.len());
    let mut subtotal = Decimal::ZERO;

    for line in requested {
        let product = by_id
            .get(&line.product_id)
            .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
        if !product.in_stock {
            return Err(CheckoutError::OutOfStock(product.name.clone()));
        }

        let priced = PricedLine {
            product: (*product).clone(),
            quantity: line.quantity,
            unit_price: product.offer_price,
        };
        subtotal = subtotal
            .checked_add(priced.line_total())
            .ok_or(CheckoutError::Overflow)?;
        lines.push(priced);
    }

    let tax = tax_for(subtotal);
    let amount = subtotal.checked_add(tax).ok_or(CheckoutError::Overflow)?;

    Ok(OrderQuote {
        lines,
        subtotal,
        tax,
        amount,
    })
}

/// Per-unit Stripe amount in minor units, tax included, rounded down.
///
/// Returns `None` for prices that cannot be expressed (negative or too large).
#[must_use]
pub fn stripe_unit_amount(offer_price: Decimal, currency: CurrencyCode) -> Option<i64> {
    let with_tax = offer_price.checked_mul(Decimal::ONE + TAX_RATE)?;
    Price::new(with_tax, currency).minor_units()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(id: i32, offer_cents: i64, in_stock: bool) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: vec![],
            price: Decimal::new(offer_cents + 100, 2),
            offer_price: Decimal::new(offer_cents, 2),
            images: vec!["https://res.cloudinary.com/demo/p.png".to_string()],
            category: "Vegetables".to_string(),
            in_stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: i32, quantity: i64) -> OrderItemInput {
        OrderItemInput {
            product: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_tax_rate_is_two_percent() {
        assert_eq!(TAX_RATE, Decimal::new(2, 2));
    }

    #[test]
    fn test_tax_rounds_down_to_cents() {
        // 2% of 10.99 is 0.2198
        assert_eq!(tax_for(Decimal::new(1099, 2)), Decimal::new(21, 2));
        // 2% of 0.49 is 0.0098
        assert_eq!(tax_for(Decimal::new(49, 2)), Decimal::ZERO);
        assert_eq!(tax_for(Decimal::new(10000, 2)), Decimal::new(200, 2));
    }

    #[test]
    fn test_merge_items_merges_duplicates_in_order() {
        let merged = merge_items(&[item(2, 1), item(1, 3), item(2, 4)]).unwrap();
        assert_eq!(
            merged,
            vec![
                RequestedLine {
                    product_id: ProductId::new(2),
                    quantity: 5
                },
                RequestedLine {
                    product_id: ProductId::new(1),
                    quantity: 3
                },
            ]
        );
    }

    #[test]
    fn test_merge_items_rejects_bad_input() {
        assert_eq!(merge_items(&[]), Err(CheckoutError::Empty));
        assert_eq!(
            merge_items(&[item(1, 0)]),
            Err(CheckoutError::InvalidQuantity(ProductId::new(1)))
        );
        assert_eq!(
            merge_items(&[item(1, 100)]),
            Err(CheckoutError::InvalidQuantity(ProductId::new(1)))
        );
        assert_eq!(
            merge_items(&[item(1, 60), item(1, 40)]),
            Err(CheckoutError::InvalidQuantity(ProductId::new(1)))
        );
    }

    #[test]
    fn test_quote_totals() {
        let catalog = vec![product(1, 250, true), product(2, 1099, true)];
        let requested = merge_items(&[item(1, 2), item(2, 1)]).unwrap();
        let quote = quote(&requested, &catalog).unwrap();

        // 2 × 2.50 + 10.99 = 15.99; tax 0.3198 → 0.31
        assert_eq!(quote.subtotal, Decimal::new(1599, 2));
        assert_eq!(quote.tax, Decimal::new(31, 2));
        assert_eq!(quote.amount, Decimal::new(1630, 2));
        assert_eq!(quote.new_order_lines().len(), 2);
        assert_eq!(quote.new_order_lines()[0].unit_price, Decimal::new(250, 2));
    }

    #[test]
    fn test_quote_rejects_unknown_and_out_of_stock() {
        let catalog = vec![product(1, 250, false)];
        let requested = merge_items(&[item(2, 1)]).unwrap();
        assert_eq!(
            quote(&requested, &catalog).unwrap_err(),
            CheckoutError::UnknownProduct(ProductId::new(2))
        );

        let requested = merge_items(&[item(1, 1)]).unwrap();
        assert!(matches!(
            quote(&requested, &catalog),
            Err(CheckoutError::OutOfStock(_))
        ));
    }

    #[test]
    fn test_stripe_unit_amount_floors() {
        // 10.99 × 1.02 = 11.2098 → 1120 cents
        assert_eq!(
            stripe_unit_amount(Decimal::new(1099, 2), CurrencyCode::USD),
            Some(1120)
        );
        // 5.00 × 1.02 = 5.10 → 510 cents
        assert_eq!(
            stripe_unit_amount(Decimal::new(500, 2), CurrencyCode::USD),
            Some(510)
        );
        assert_eq!(
            stripe_unit_amount(Decimal::new(-1, 0), CurrencyCode::USD),
            None
        );
    }
}
