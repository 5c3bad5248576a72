//! Order repository.
//!
//! Orders are created unpaid. An online order becomes paid exactly once,
//! through [`OrderRepository::mark_paid`]; online orders whose checkout fails
//! are removed with [`OrderRepository::delete_unpaid`].

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use greencart_core::{AddressId, OrderId, OrderStatus, PaymentType, UserId};

use super::{AddressRepository, RepositoryError, carts};
use crate::models::order::{NewOrderLine, Order, OrderLineView, OrderView};
use crate::models::product::Product;

const ORDER_COLUMNS: &str = "id, user_id, address_id, amount, status, payment_type, is_paid, \
                             stripe_session_id, paid_at, created_at, updated_at";

/// Orders counted as placed: cash on delivery, or online and paid.
const VISIBLE_FILTER: &str = "(payment_type = 'cod' OR is_paid = TRUE)";

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

#[derive(sqlx::FromRow)]
struct LineRow {
    order_id: OrderId,
    quantity: i32,
    unit_price: Decimal,
    #[sqlx(flatten)]
    product: Product,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order with its lines.
    ///
    /// Cash-on-delivery orders also clear the user's cart in the same
    /// transaction. Online orders keep the cart until payment is confirmed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is written then.
    pub async fn create(
        &self,
        user_id: UserId,
        address_id: AddressId,
        amount: Decimal,
        payment_type: PaymentType,
        lines: &[NewOrderLine],
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO storefront.orders (user_id, address_id, amount, payment_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(address_id)
        .bind(amount)
        .bind(payment_type)
        .fetch_one(&mut *tx)
        .await?;

        insert_lines(&mut tx, order.id, lines).await?;

        if payment_type == PaymentType::Cod {
            carts::clear(&mut tx, user_id).await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    /// Remember the Stripe Checkout Session created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order no longer exists.
    pub async fn set_stripe_session(
        &self,
        id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE storefront.orders SET stripe_session_id = $2 WHERE id = $1")
                .bind(id)
                .bind(session_id)
                .execute(self.pool)
                .await
                .map_err(|e| RepositoryError::from_unique_violation(e, "duplicate session id"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Flip an online order to paid and clear the buyer's cart.
    ///
    /// Returns the order only when this call performed the transition; an
    /// order that is already paid, missing, or bound to a different session
    /// yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        session_id: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r"
            UPDATE storefront.orders
            SET is_paid = TRUE, paid_at = NOW()
            WHERE id = $1
              AND is_paid = FALSE
              AND payment_type = 'online'
              AND ($2::text IS NULL OR stripe_session_id IS NULL OR stripe_session_id = $2)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(ref order) = order {
            carts::clear(&mut tx, order.user_id).await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    /// Delete an online order that was never paid. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_unpaid(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.orders \
             WHERE id = $1 AND is_paid = FALSE AND payment_type = 'online'",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Advance the fulfilment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has this ID.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE storefront.orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Placed orders of one user (or of everyone when `user_id` is `None`),
    /// newest first, with lines and address populated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if an order's address is missing.
    pub async fn list_placed(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<OrderView>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders \
             WHERE {VISIBLE_FILTER} AND ($1::int4 IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.populate(orders).await
    }

    /// One order with lines and address populated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_view(&self, id: OrderId) -> Result<Option<OrderView>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(order) = order else {
            return Ok(None);
        };
        Ok(self.populate(vec![order]).await?.pop())
    }

    async fn populate(&self, orders: Vec<Order>) -> Result<Vec<OrderView>, RepositoryError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        let line_rows = sqlx::query_as::<_, LineRow>(
            r"
            SELECT ol.order_id, ol.quantity, ol.unit_price,
                   p.id, p.name, p.description, p.price, p.offer_price, p.images,
                   p.category, p.in_stock, p.created_at, p.updated_at
            FROM storefront.order_line ol
            JOIN storefront.product p ON p.id = ol.product_id
            WHERE ol.order_id = ANY($1)
            ORDER BY ol.order_id, p.name
            ",
        )
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut lines: HashMap<OrderId, Vec<OrderLineView>> = HashMap::new();
        for row in line_rows {
            lines.entry(row.order_id).or_default().push(OrderLineView {
                product: row.product,
                quantity: row.quantity,
                unit_price: row.unit_price,
            });
        }

        let address_ids: Vec<AddressId> = orders.iter().map(|o| o.address_id).collect();
        let addresses: HashMap<AddressId, _> = AddressRepository::new(self.pool)
            .get_many(&address_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        orders
            .into_iter()
            .map(|order| {
                let address = addresses
                    .get(&order.address_id)
                    .cloned()
                    .ok_or_else(|| {
                        RepositoryError::DataCorruption(format!(
                            "order {} references missing address {}",
                            order.id, order.address_id
                        ))
                    })?;
                let items = lines.remove(&order.id).unwrap_or_default();
                Ok(OrderView::new(order, items, address))
            })
            .collect()
    }
}

async fn insert_lines(
    conn: &mut PgConnection,
    order_id: OrderId,
    lines: &[NewOrderLine],
) -> Result<(), RepositoryError> {
    let product_ids: Vec<i32> = lines.iter().map(|l| l.product_id.as_i32()).collect();
    let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();
    let unit_prices: Vec<Decimal> = lines.iter().map(|l| l.unit_price).collect();

    sqlx::query(
        r"
        INSERT INTO storefront.order_line (order_id, product_id, quantity, unit_price)
        SELECT $1, product_id, quantity, unit_price
        FROM UNNEST($2::int4[], $3::int4[], $4::numeric[]) AS t(product_id, quantity, unit_price)
        ",
    )
    .bind(order_id)
    .bind(product_ids)
    .bind(quantities)
    .bind(unit_prices)
    .execute(conn)
    .await?;
    Ok(())
}
