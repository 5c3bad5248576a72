//! Order route handlers.
//!
//! Cash-on-delivery orders are placed (and the cart cleared) in one
//! transaction. Online orders are created unpaid, handed to Stripe Checkout,
//! and flipped to paid by the webhook.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::ORIGIN},
    routing::{get, post},
};
use serde::Serialize;
use tracing::instrument;

use greencart_core::{OrderId, PaymentType, ProductId, UserId};

use crate::db::{
    AddressRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository,
};
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::{RequireSeller, RequireUser};
use crate::models::order::UpdateStatusRequest;
use crate::models::{Address, OrderView, PlaceOrderRequest};
use crate::routes::{JsonBody, MessageResponse};
use crate::services::checkout::{self, CheckoutError, OrderQuote};
use crate::services::email::{EmailService, OrderReceipt};
use crate::services::stripe::{CheckoutLineItem, CheckoutSessionParams};
use crate::state::AppState;

/// Build the order router. The webhook is mounted separately.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cod", post(place_cod))
        .route("/stripe", post(place_stripe))
        .route("/user", get(user_orders))
        .route("/seller", get(seller_orders))
        .route("/status", post(update_status))
}

/// `{success, message, orderId}` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedResponse {
    pub success: bool,
    pub message: &'static str,
    pub order_id: OrderId,
}

/// `{success, url}` response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub url: String,
}

/// `{success, orders}` response.
#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<OrderView>,
}

/// Validate and price an order request for `user_id`.
async fn prepare_order(
    state: &AppState,
    user_id: UserId,
    body: &PlaceOrderRequest,
) -> Result<(Address, OrderQuote), AppError> {
    let address_id = body.address.ok_or(CheckoutError::Empty)?;
    let requested = checkout::merge_items(&body.items)?;

    let ids: Vec<ProductId> = requested.iter().map(|line| line.product_id).collect();
    let catalog = ProductRepository::new(state.pool()).get_many(&ids).await?;
    let quote = checkout::quote(&requested, &catalog)?;

    let address = AddressRepository::new(state.pool())
        .get_owned(address_id, user_id)
        .await?
        .ok_or(CheckoutError::Empty)?;

    Ok((address, quote))
}

/// Place a cash-on-delivery order.
///
/// POST /api/order/cod
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn place_cod(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), AppError> {
    let (address, quote) = prepare_order(&state, user.id, &body).await?;

    let order = OrderRepository::new(state.pool())
        .create(
            user.id,
            address.id,
            quote.amount,
            PaymentType::Cod,
            &quote.new_order_lines(),
        )
        .await?;

    tracing::info!(order_id = %order.id, amount = %order.amount, "COD order placed");
    let order_ref = order.id.to_string();
    add_breadcrumb("order", "Placed COD order", Some(&[("order_id", order_ref.as_str())][..]));
    send_receipt_in_background(&state, order.id);

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            success: true,
            message: "Order Placed Successfully",
            order_id: order.id,
        }),
    ))
}

/// Place an online order and return the Stripe Checkout URL.
///
/// POST /api/order/stripe
#[instrument(skip(state, user, headers, body), fields(user_id = %user.id))]
pub async fn place_stripe(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    headers: HeaderMap,
    JsonBody(body): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let (address, quote) = prepare_order(&state, user.id, &body).await?;
    let currency = state.config().currency;

    let line_items = quote
        .lines
        .iter()
        .map(|line| {
            checkout::stripe_unit_amount(line.unit_price, currency)
                .map(|unit_amount| CheckoutLineItem {
                    name: line.product.name.clone(),
                    unit_amount,
                    quantity: line.quantity,
                })
                .ok_or(CheckoutError::Overflow)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let orders = OrderRepository::new(state.pool());
    let order = orders
        .create(
            user.id,
            address.id,
            quote.amount,
            PaymentType::Online,
            &quote.new_order_lines(),
        )
        .await?;

    let origin = request_origin(&headers, &state.config().frontend_url);
    let success_url = format!("{origin}/loader?next=my-orders");
    let cancel_url = format!("{origin}/cart");

    let params = CheckoutSessionParams {
        order_id: order.id,
        user_id: user.id,
        customer_email: Some(user.email.as_str()),
        currency,
        line_items: &line_items,
        success_url: &success_url,
        cancel_url: &cancel_url,
    };

    let session = match state.stripe().create_checkout_session(&params).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(order_id = %order.id, "Checkout session failed, removing order: {e}");
            if let Err(cleanup) = orders.delete_unpaid(order.id).await {
                tracing::error!(order_id = %order.id, "Failed to remove unpaid order: {cleanup}");
            }
            return Err(e.into());
        }
    };

    orders.set_stripe_session(order.id, &session.id).await?;

    let url = session.url.ok_or_else(|| {
        AppError::Internal(format!("checkout session {} has no url", session.id))
    })?;

    tracing::info!(order_id = %order.id, session_id = %session.id, "Online order created");

    Ok((StatusCode::CREATED, Json(CheckoutResponse { success: true, url })))
}

/// The shopper's placed orders, newest first.
///
/// GET /api/order/user
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn user_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<OrdersResponse>, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_placed(Some(user.id))
        .await?;

    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}

/// Every placed order, newest first.
///
/// GET /api/order/seller
#[instrument(skip(state, _seller))]
pub async fn seller_orders(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
) -> Result<Json<OrdersResponse>, AppError> {
    let orders = OrderRepository::new(state.pool()).list_placed(None).await?;

    Ok(Json(OrdersResponse {
        success: true,
        orders,
    }))
}

/// Change an order's fulfilment status.
///
/// POST /api/order/status
#[instrument(skip(state, _seller))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
    JsonBody(body): JsonBody<UpdateStatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    OrderRepository::new(state.pool())
        .update_status(body.order_id, body.status)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Order not found".to_string()),
            other => other.into(),
        })?;

    tracing::info!(order_id = %body.order_id, status = %body.status, "Order status updated");
    Ok(MessageResponse::ok("Status Updated"))
}

/// Origin the SPA was served from, for Stripe redirect URLs.
fn request_origin(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|origin| origin.starts_with("http://") || origin.starts_with("https://"))
        .unwrap_or(fallback)
        .trim_end_matches('/')
        .to_string()
}

/// Email the order receipt on a background task. Failures are only logged.
pub(crate) fn send_receipt_in_background(state: &AppState, order_id: OrderId) {
    let Some(email) = state.email().cloned() else {
        tracing::debug!(order_id = %order_id, "SMTP not configured, skipping receipt");
        return;
    };

    let state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = send_receipt(&state, &email, order_id).await {
            tracing::warn!(order_id = %order_id, "Failed to send order receipt: {e}");
        }
    });
}

async fn send_receipt(
    state: &AppState,
    email: &EmailService,
    order_id: OrderId,
) -> Result<(), AppError> {
    let order = OrderRepository::new(state.pool())
        .get_view(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
    let user = UserRepository::new(state.pool())
        .get_by_id(order.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", order.user_id)))?;

    let receipt = OrderReceipt::from_view(
        &order,
        &user.name,
        state.config().currency,
        &state.config().frontend_url,
    );
    email.send_order_receipt(user.email.as_str(), &receipt).await?;
    Ok(())
}
