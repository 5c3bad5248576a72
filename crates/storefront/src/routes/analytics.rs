//! Seller analytics route handler.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::AnalyticsRepository;
use crate::error::AppError;
use crate::middleware::RequireSeller;
use crate::models::analytics::{AnalyticsRange, AnalyticsReport};
use crate::routes::QueryParams;
use crate::state::AppState;

/// Default number of top products.
const DEFAULT_TOP_PRODUCTS: i64 = 5;

/// Largest accepted `limit`.
const MAX_TOP_PRODUCTS: i64 = 50;

/// Build the analytics router (nested under `/api/seller`).
pub fn router() -> Router<AppState> {
    Router::new().route("/analytics", get(report))
}

/// `?range=7d|30d|90d|all&limit=N`
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub range: Option<String>,
    pub limit: Option<i64>,
}

impl AnalyticsQuery {
    fn range(&self) -> AnalyticsRange {
        AnalyticsRange::from_param(self.range.as_deref())
    }

    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_TOP_PRODUCTS)
            .clamp(1, MAX_TOP_PRODUCTS)
    }
}

/// `{success, analytics}` response.
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub success: bool,
    pub analytics: AnalyticsReport,
}

/// Sales analytics for the requested window.
///
/// GET /api/seller/analytics
#[instrument(skip(state, _seller))]
pub async fn report(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
    QueryParams(query): QueryParams<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let range = query.range();
    let since = range.since(Utc::now());
    let repo = AnalyticsRepository::new(state.pool());

    let (summary, daily, top_products, categories, payments, statuses) = tokio::try_join!(
        repo.summary(since),
        repo.daily(since),
        repo.top_products(since, query.limit()),
        repo.categories(since),
        repo.payments(since),
        repo.statuses(since),
    )?;

    Ok(Json(AnalyticsResponse {
        success: true,
        analytics: AnalyticsReport {
            range,
            since,
            summary,
            daily,
            top_products,
            categories,
            payments,
            statuses,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        let query = |limit| AnalyticsQuery { range: None, limit };
        assert_eq!(query(None).limit(), 5);
        assert_eq!(query(Some(0)).limit(), 1);
        assert_eq!(query(Some(500)).limit(), 50);
        assert_eq!(query(Some(12)).limit(), 12);
    }

    #[test]
    fn test_range_defaults_to_thirty_days() {
        let query = AnalyticsQuery::default();
        assert_eq!(query.range(), AnalyticsRange::Last30Days);
    }
}
