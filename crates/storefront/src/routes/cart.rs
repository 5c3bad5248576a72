//! Cart route handler.
//!
//! The SPA keeps the cart client-side and sends the whole map on every change.

use std::collections::HashMap;

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use tracing::instrument;

use greencart_core::ProductId;

use crate::db::{CartRepository, RepositoryError};
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::routes::{JsonBody, MessageResponse};
use crate::services::checkout::MAX_LINE_QUANTITY;
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new().route("/update", post(update))
}

/// `{cartItems: {productId: quantity}}` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCartRequest {
    pub cart_items: HashMap<String, i64>,
}

/// Turn the SPA's cart map into rows. Non-positive quantities drop the entry.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for keys that are not product IDs or
/// quantities above the per-line maximum.
pub fn parse_cart_items(items: &HashMap<String, i64>) -> Result<Vec<(ProductId, i32)>, AppError> {
    let mut rows = Vec::with_capacity(items.len());

    for (key, &quantity) in items {
        let id = key
            .parse::<ProductId>()
            .ok()
            .filter(|id| id.as_i32() > 0)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid product id: {key}")))?;

        if quantity <= 0 {
            continue;
        }
        let quantity = i32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Quantity for product {id} is too large"))
            })?;

        rows.push((id, quantity));
    }

    rows.sort_by_key(|(id, _)| id.as_i32());
    Ok(rows)
}

/// Replace the shopper's cart.
///
/// POST /api/cart/update
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<UpdateCartRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let rows = parse_cart_items(&body.cart_items)?;

    CartRepository::new(state.pool())
        .replace(user.id, &rows)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                AppError::BadRequest("Cart contains an unknown product".to_string())
            }
            other => other.into(),
        })?;

    Ok(MessageResponse::ok("Cart Updated"))
}
