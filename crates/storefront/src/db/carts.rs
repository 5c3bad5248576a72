//! Cart repository.
//!
//! A cart is the set of `cart_item` rows for a user. Writes replace the whole
//! set in one transaction so the SPA's view and the database never diverge.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};

use greencart_core::{ProductId, UserId};

use super::RepositoryError;

pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart as `product_id -> quantity`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<HashMap<ProductId, i32>, RepositoryError> {
        let rows = sqlx::query_as::<_, (ProductId, i32)>(
            "SELECT product_id, quantity FROM storefront.cart_item WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Replace the user's cart with `items`. Entries must have positive quantities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if an item references a missing product.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn replace(
        &self,
        user_id: UserId,
        items: &[(ProductId, i32)],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        clear(&mut tx, user_id).await?;

        if !items.is_empty() {
            let product_ids: Vec<i32> = items.iter().map(|(id, _)| id.as_i32()).collect();
            let quantities: Vec<i32> = items.iter().map(|(_, qty)| *qty).collect();

            sqlx::query(
                r"
                INSERT INTO storefront.cart_item (user_id, product_id, quantity)
                SELECT $1, product_id, quantity
                FROM UNNEST($2::int4[], $3::int4[]) AS t(product_id, quantity)
                ",
            )
            .bind(user_id)
            .bind(product_ids)
            .bind(quantities)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::NotFound;
                }
                RepositoryError::Database(e)
            })?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Empty a user's cart on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
