//! Seller analytics types.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use greencart_core::{OrderStatus, PaymentType, ProductId, UserId};

/// Reporting window presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalyticsRange {
    #[serde(rename = "7d")]
    Last7Days,
    #[default]
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "all")]
    AllTime,
}

impl AnalyticsRange {
    /// Parse a preset, falling back to 30 days for anything unrecognized.
    #[must_use]
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some("7d") => Self::Last7Days,
            Some("90d") => Self::Last90Days,
            Some("all") => Self::AllTime,
            _ => Self::Last30Days,
        }
    }

    /// Number of days covered, `None` for all time.
    #[must_use]
    pub const fn days(self) -> Option<i64> {
        match self {
            Self::Last7Days => Some(7),
            Self::Last30Days => Some(30),
            Self::Last90Days => Some(90),
            Self::AllTime => None,
        }
    }

    /// Inclusive lower bound for `created_at`, `None` for all time.
    #[must_use]
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|days| now - Duration::days(days))
    }
}

/// Headline numbers for the window.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub revenue: Decimal,
    pub orders: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub average_order_value: Decimal,
    pub customers: i64,
    pub paid_online_orders: i64,
    pub total_products: i64,
    pub out_of_stock_products: i64,
    pub registered_users: i64,
}

/// Orders and revenue for one calendar day (UTC).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub orders: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub revenue: Decimal,
}

/// Best sellers by units.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub units: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: String,
    pub units: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBreakdown {
    pub payment_type: PaymentType,
    pub orders: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub status: OrderStatus,
    pub orders: i64,
}

/// Everything the seller dashboard renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub range: AnalyticsRange,
    pub since: Option<DateTime<Utc>>,
    pub summary: AnalyticsSummary,
    pub daily: Vec<DailyPoint>,
    pub top_products: Vec<TopProduct>,
    pub categories: Vec<CategoryBreakdown>,
    pub payments: Vec<PaymentBreakdown>,
    pub statuses: Vec<StatusBreakdown>,
}

/// A shopper as listed on the seller's customer page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub orders: i64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub lifetime_spend: Decimal,
    pub last_order_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
