//! Shopper account route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::db::CartRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    RequireUser, auth_rate_limiter, clear_current_user, set_current_user,
};
use crate::models::{CurrentUser, UserProfile};
use crate::routes::{JsonBody, MessageResponse};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Build the shopper account router.
pub fn router() -> Router<AppState> {
    let credentials = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/is-auth", get(is_auth))
        .route("/logout", post(logout))
        .merge(credentials)
}

/// Registration request body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `{success, user}` response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: UserProfile,
}

/// Create an account and log it in.
///
/// POST /api/user/register
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = AuthService::new(state.pool())
        .register(&body.name, &body.email, &body.password)
        .await?;

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            success: true,
            user: UserProfile::from(&user),
        }),
    ))
}

/// Log in with email and password.
///
/// POST /api/user/login
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = match AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Login failed: {e}");
            return Err(e.into());
        }
    };

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok(Json(UserResponse {
        success: true,
        user: UserProfile::from(&user),
    }))
}

/// Current user with their saved cart.
///
/// GET /api/user/is-auth
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn is_auth(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<UserResponse>, AppError> {
    let cart = CartRepository::new(state.pool()).get(user.id).await?;

    Ok(Json(UserResponse {
        success: true,
        user: UserProfile::from(&user).with_cart(cart),
    }))
}

/// Log out the shopper. A seller login in the same session is kept.
///
/// POST /api/user/logout
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<MessageResponse>, AppError> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(MessageResponse::ok("Logged Out"))
}
