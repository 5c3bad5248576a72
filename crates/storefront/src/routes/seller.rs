//! Seller session route handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::db::AnalyticsRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::{
    RequireSeller, auth_rate_limiter, clear_current_seller, set_current_seller,
};
use crate::models::CurrentSeller;
use crate::models::analytics::CustomerSummary;
use crate::routes::{JsonBody, MessageResponse};
use crate::services::auth::verify_seller;
use crate::state::AppState;

/// Build the seller router.
pub fn router() -> Router<AppState> {
    let credentials = Router::new()
        .route("/login", post(login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/is-auth", get(is_auth))
        .route("/logout", post(logout))
        .route("/customers", get(customers))
        .merge(credentials)
}

/// Seller login body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SellerLoginRequest {
    pub email: String,
    pub password: String,
}

/// `{success}` response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `{success, customers}` response.
#[derive(Debug, Serialize)]
pub struct CustomersResponse {
    pub success: bool,
    pub customers: Vec<CustomerSummary>,
}

/// Log in as the seller.
///
/// POST /api/seller/login
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<SellerLoginRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = verify_seller(&state.config().seller, &body.email, &body.password)
        .inspect_err(|_| tracing::warn!("Seller login failed"))?;

    set_current_seller(&session, &CurrentSeller { email }).await?;
    add_breadcrumb("auth", "Seller logged in", None);

    Ok(MessageResponse::ok("Logged In"))
}

/// GET /api/seller/is-auth
pub async fn is_auth(RequireSeller(_seller): RequireSeller) -> Json<SuccessResponse> {
    Json(SuccessResponse { success: true })
}

/// POST /api/seller/logout
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<MessageResponse>, AppError> {
    clear_current_seller(&session).await?;
    Ok(MessageResponse::ok("Logged Out"))
}

/// Customers with their order count and lifetime spend.
///
/// GET /api/seller/customers
#[instrument(skip(state, _seller))]
pub async fn customers(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
) -> Result<Json<CustomersResponse>, AppError> {
    let customers = AnalyticsRepository::new(state.pool()).customers().await?;

    Ok(Json(CustomersResponse {
        success: true,
        customers,
    }))
}
