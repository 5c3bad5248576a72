//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Shoppers
//! POST /api/user/register      - Create account and log in
//! POST /api/user/login         - Log in
//! GET  /api/user/is-auth       - Current user with cart
//! POST /api/user/logout        - Log out
//!
//! # Seller
//! POST /api/seller/login       - Log in with configured credentials
//! GET  /api/seller/is-auth     - Seller session check
//! POST /api/seller/logout      - Log out
//! GET  /api/seller/customers   - Customers with order totals
//! GET  /api/seller/analytics   - Sales analytics
//!
//! # Catalog
//! POST /api/product/add        - Add product (seller, multipart)
//! GET  /api/product/list       - All products, newest first
//! POST /api/product/id         - One product
//! POST /api/product/stock      - Toggle stock (seller)
//!
//! # Cart and addresses
//! POST /api/cart/update        - Replace cart
//! POST /api/address/add        - Save address
//! GET  /api/address/get        - List addresses
//!
//! # Orders
//! POST /api/order/cod          - Place cash-on-delivery order
//! POST /api/order/stripe       - Place online order, returns Checkout URL
//! GET  /api/order/user         - Shopper's orders
//! GET  /api/order/seller       - All orders (seller)
//! POST /api/order/status       - Update fulfilment status (seller)
//! POST /api/order/webhook      - Stripe webhook (raw body)
//! ```

pub mod address;
pub mod analytics;
pub mod cart;
pub mod order;
pub mod product;
pub mod seller;
pub mod user;
pub mod webhook;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Multipart, Query, Request,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::request::Parts,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::middleware::api_rate_limiter;
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error envelope.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string extractor whose rejections use the API error envelope.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Multipart extractor whose rejections use the API error envelope.
pub struct MultipartForm(pub Multipart);

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Multipart::from_request(req, state)
            .await
            .map(Self)
            .map_err(|rejection: MultipartRejection| AppError::BadRequest(rejection.body_text()))
    }
}

/// `{success: true, message}` response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

impl MessageResponse {
    /// A successful response with a message.
    #[must_use]
    pub const fn ok(message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

/// Create all API routes for the storefront.
///
/// Login and registration carry their own stricter rate limit.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/user", user::router())
        .nest("/seller", seller::router().merge(analytics::router()))
        .nest("/product", product::router())
        .nest("/cart", cart::router())
        .nest("/address", address::router())
        .nest("/order", order::router())
        .layer(api_rate_limiter());

    Router::new()
        .nest("/api", api)
        // Stripe retries deliveries; keep the webhook out of the client rate limit
        .route("/api/order/webhook", axum::routing::post(webhook::stripe_webhook))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{StatusCode, header},
        routing::{get, post},
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Deserialize)]
    struct Echo {
        name: String,
    }

    async fn echo(JsonBody(body): JsonBody<Echo>) -> String {
        body.name
    }

    #[derive(Deserialize)]
    struct Page {
        limit: i64,
    }

    async fn page(QueryParams(query): QueryParams<Page>) -> String {
        query.limit.to_string()
    }

    async fn upload(MultipartForm(_form): MultipartForm) -> &'static str {
        "ok"
    }

    async fn read_envelope(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_json_body_accepts_valid_json() {
        let app = Router::new().route("/echo", post(echo));
        let response = app.oneshot(post_json(r#"{"name":"kale"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_json_body_rejection_uses_envelope() {
        let app = Router::new().route("/echo", post(echo));
        let response = app.oneshot(post_json(r#"{"name":"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_query_params_rejection_uses_envelope() {
        let app = Router::new().route("/page", get(page));

        let ok = Request::builder().uri("/page?limit=3").body(Body::empty()).unwrap();
        assert_eq!(app.clone().oneshot(ok).await.unwrap().status(), StatusCode::OK);

        let bad = Request::builder().uri("/page?limit=abc").body(Body::empty()).unwrap();
        let response = app.oneshot(bad).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_envelope(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_multipart_rejection_uses_envelope() {
        let app = Router::new().route("/echo", post(upload));
        let response = app.oneshot(post_json(r#"{"name":"kale"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_envelope(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].is_string());
    }
}
