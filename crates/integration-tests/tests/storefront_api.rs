//! In-process tests for the storefront router.
//!
//! Requests go through every middleware layer. The pool is lazy and never
//! reachable, so these only cover paths that are decided before the database.

use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use greencart_integration_tests::{
    FRONTEND_URL, SELLER_EMAIL, json_request, read_json, request, test_app,
};

// =============================================================================
// Health and middleware
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health"))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store, max-age=0");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let mut req = request(Method::GET, "/health");
    req.headers_mut()
        .insert("x-request-id", "edge-42".parse().unwrap());

    let response = test_app().oneshot(req).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "edge-42");
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend_with_credentials() {
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/user/login")
        .header(header::ORIGIN, FRONTEND_URL)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = test_app().oneshot(req).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND_URL);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn test_cors_rejects_unknown_origin() {
    let mut req = request(Method::GET, "/health");
    req.headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());

    let response = test_app().oneshot(req).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

// =============================================================================
// Shopper auth
// =============================================================================

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let body = json!({"name": "Asha Rao", "email": "asha@example.com", "password": "short"});
    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/user/register", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("Password"));
}

#[tokio::test]
async fn test_register_rejects_bad_email() {
    let body = json!({"name": "Asha Rao", "email": "not-an-email", "password": "Str0ngPass"});
    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/user/register", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/user/login")
        .header("x-forwarded-for", "203.0.113.7")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let response = test_app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["success"], false);
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let body = json!({"email": "asha@example.com"});
    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/user/login", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_is_auth_without_session() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/user/is-auth"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = read_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Not Authorized");
}

#[tokio::test]
async fn test_auth_endpoints_are_rate_limited() {
    let app = test_app();
    let body = json!({"email": "", "password": ""});

    let mut statuses = Vec::new();
    let mut limited = None;
    for _ in 0..8 {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/user/login", &body))
            .await
            .unwrap();
        statuses.push(response.status());
        if response.status() == StatusCode::TOO_MANY_REQUESTS && limited.is_none() {
            limited = Some(response);
        }
    }

    assert_eq!(statuses[0], StatusCode::BAD_REQUEST);
    let limited = limited.expect("auth limiter never answered 429");
    assert!(limited.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(limited.headers()[header::CONTENT_TYPE], "application/json");

    let json = read_json(limited).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Too many requests, please try again later");
}

// =============================================================================
// Seller auth
// =============================================================================

#[tokio::test]
async fn test_seller_login_wrong_password() {
    let body = json!({"email": SELLER_EMAIL, "password": "wrong-password"});
    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/seller/login", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_seller_endpoints_require_seller_session() {
    for uri in [
        "/api/seller/is-auth",
        "/api/seller/analytics",
        "/api/seller/customers",
        "/api/order/seller",
    ] {
        let response = test_app()
            .oneshot(request(Method::GET, uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

// =============================================================================
// Shopper endpoints
// =============================================================================

#[tokio::test]
async fn test_shopper_endpoints_require_user_session() {
    let body = json!({});
    for uri in ["/api/cart/update", "/api/address/add", "/api/order/cod", "/api/order/stripe"] {
        let response = test_app()
            .oneshot(json_request(Method::POST, uri, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    for uri in ["/api/address/get", "/api/order/user"] {
        let response = test_app()
            .oneshot(request(Method::GET, uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}
