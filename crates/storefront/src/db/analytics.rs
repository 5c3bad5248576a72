//! Seller analytics queries.
//!
//! Every aggregation counts only placed orders (cash on delivery, or online
//! and paid) created at or after `since`; `None` means all time.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::analytics::{
    AnalyticsSummary, CategoryBreakdown, CustomerSummary, DailyPoint, PaymentBreakdown,
    StatusBreakdown, TopProduct,
};

pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Headline numbers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<AnalyticsSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, AnalyticsSummary>(
            r"
            WITH placed AS (
                SELECT * FROM storefront.orders
                WHERE (payment_type = 'cod' OR is_paid = TRUE)
                  AND ($1::timestamptz IS NULL OR created_at >= $1)
            )
            SELECT
                COALESCE(SUM(amount), 0)::numeric AS revenue,
                COUNT(*) AS orders,
                COALESCE(ROUND(AVG(amount), 2), 0)::numeric AS average_order_value,
                COUNT(DISTINCT user_id) AS customers,
                COUNT(*) FILTER (WHERE payment_type = 'online') AS paid_online_orders,
                (SELECT COUNT(*) FROM storefront.product) AS total_products,
                (SELECT COUNT(*) FROM storefront.product WHERE NOT in_stock) AS out_of_stock_products,
                (SELECT COUNT(*) FROM storefront.user) AS registered_users
            FROM placed
            ",
        )
        .bind(since)
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    /// Orders and revenue per UTC day, oldest first. Days without orders are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DailyPoint>, RepositoryError> {
        let points = sqlx::query_as::<_, DailyPoint>(
            r"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS date,
                   COUNT(*) AS orders,
                   SUM(amount)::numeric AS revenue
            FROM storefront.orders
            WHERE (payment_type = 'cod' OR is_paid = TRUE)
              AND ($1::timestamptz IS NULL OR created_at >= $1)
            GROUP BY 1
            ORDER BY 1
            ",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(points)
    }

    /// Best sellers by units, then revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let products = sqlx::query_as::<_, TopProduct>(
            r"
            SELECT p.id AS product_id, p.name, p.category,
                   SUM(ol.quantity)::int8 AS units,
                   SUM(ol.quantity * ol.unit_price)::numeric AS revenue
            FROM storefront.order_line ol
            JOIN storefront.orders o ON o.id = ol.order_id
            JOIN storefront.product p ON p.id = ol.product_id
            WHERE (o.payment_type = 'cod' OR o.is_paid = TRUE)
              AND ($1::timestamptz IS NULL OR o.created_at >= $1)
            GROUP BY p.id, p.name, p.category
            ORDER BY units DESC, revenue DESC, p.id
            LIMIT $2
            ",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Units and revenue per category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CategoryBreakdown>, RepositoryError> {
        let categories = sqlx::query_as::<_, CategoryBreakdown>(
            r"
            SELECT p.category,
                   SUM(ol.quantity)::int8 AS units,
                   SUM(ol.quantity * ol.unit_price)::numeric AS revenue
            FROM storefront.order_line ol
            JOIN storefront.orders o ON o.id = ol.order_id
            JOIN storefront.product p ON p.id = ol.product_id
            WHERE (o.payment_type = 'cod' OR o.is_paid = TRUE)
              AND ($1::timestamptz IS NULL OR o.created_at >= $1)
            GROUP BY p.category
            ORDER BY revenue DESC, p.category
            ",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Order count and revenue per payment type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn payments(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PaymentBreakdown>, RepositoryError> {
        let payments = sqlx::query_as::<_, PaymentBreakdown>(
            r"
            SELECT payment_type, COUNT(*) AS orders, SUM(amount)::numeric AS revenue
            FROM storefront.orders
            WHERE (payment_type = 'cod' OR is_paid = TRUE)
              AND ($1::timestamptz IS NULL OR created_at >= $1)
            GROUP BY payment_type
            ORDER BY payment_type
            ",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(payments)
    }

    /// Order count per fulfilment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn statuses(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusBreakdown>, RepositoryError> {
        let statuses = sqlx::query_as::<_, StatusBreakdown>(
            r"
            SELECT status, COUNT(*) AS orders
            FROM storefront.orders
            WHERE (payment_type = 'cod' OR is_paid = TRUE)
              AND ($1::timestamptz IS NULL OR created_at >= $1)
            GROUP BY status
            ORDER BY status
            ",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(statuses)
    }

    /// Registered shoppers with their placed-order count and lifetime spend.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customers(&self) -> Result<Vec<CustomerSummary>, RepositoryError> {
        let customers = sqlx::query_as::<_, CustomerSummary>(
            r"
            SELECT u.id, u.name, u.email,
                   COUNT(o.id) AS orders,
                   COALESCE(SUM(o.amount), 0)::numeric AS lifetime_spend,
                   MAX(o.created_at) AS last_order_at,
                   u.created_at
            FROM storefront.user u
            LEFT JOIN storefront.orders o
                   ON o.user_id = u.id AND (o.payment_type = 'cod' OR o.is_paid = TRUE)
            GROUP BY u.id
            ORDER BY lifetime_spend DESC, u.created_at DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(customers)
    }
}
