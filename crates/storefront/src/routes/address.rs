//! Address book route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::AddressRepository;
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{Address, AddressInput};
use crate::routes::JsonBody;
use crate::services::validation::validate_address;
use crate::state::AppState;

/// Build the address router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add", post(add))
        .route("/get", get(list))
}

/// `{address}` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddAddressRequest {
    pub address: AddressInput,
}

/// `{success, message, address}` response.
#[derive(Debug, Serialize)]
pub struct AddressAddedResponse {
    pub success: bool,
    pub message: &'static str,
    pub address: Address,
}

/// `{success, addresses}` response.
#[derive(Debug, Serialize)]
pub struct AddressListResponse {
    pub success: bool,
    pub addresses: Vec<Address>,
}

/// Save a delivery address.
///
/// POST /api/address/add
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<AddAddressRequest>,
) -> Result<(StatusCode, Json<AddressAddedResponse>), AppError> {
    let input = validate_address(&body.address)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddressAddedResponse {
            success: true,
            message: "Address added successfully",
            address,
        }),
    ))
}

/// The shopper's addresses, newest first.
///
/// GET /api/address/get
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<AddressListResponse>, AppError> {
    let addresses = AddressRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(Json(AddressListResponse {
        success: true,
        addresses,
    }))
}
