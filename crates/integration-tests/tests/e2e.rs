//! End-to-end tests against a running storefront.
//!
//! Needs a migrated database and a server started with the usual environment.
//! Set `GREENCART_E2E_URL` (default `http://127.0.0.1:4000`) and run with
//! `--ignored`. Tests that seed data also need `DATABASE_URL` pointing at the
//! server's database, the webhook test needs the server's
//! `STRIPE_WEBHOOK_SECRET`, and seller tests need `SELLER_EMAIL` and
//! `SELLER_PASSWORD`.

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::PgPool;

use greencart_core::{AddressId, PaymentType, ProductId, UserId};
use greencart_storefront::db::{OrderRepository, ProductRepository};
use greencart_storefront::models::order::NewOrderLine;
use greencart_storefront::models::{NewProduct, Product};
use greencart_storefront::services::stripe::compute_signature;

fn base_url() -> String {
    std::env::var("GREENCART_E2E_URL").unwrap_or_else(|_| "http://127.0.0.1:4000".to_string())
}

fn client() -> Client {
    Client::builder().cookie_store(true).build().unwrap()
}

fn unique_email() -> String {
    format!(
        "e2e-{}@greencart.test",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

async fn post(client: &Client, path: &str, body: &Value) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}{path}", base_url()))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn database() -> PgPool {
    let url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must point at the server's database");
    PgPool::connect(&url).await.unwrap()
}

/// Insert an in-stock product straight into the catalog.
async fn seed_product(pool: &PgPool) -> Product {
    ProductRepository::new(pool)
        .create(&NewProduct {
            name: format!(
                "E2E Kale {}",
                chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
            ),
            description: vec!["Curly kale, one bunch".to_string()],
            category: "Vegetables".to_string(),
            price: Decimal::new(399, 2),
            offer_price: Decimal::new(349, 2),
            images: vec!["https://res.cloudinary.com/demo/image/upload/kale.png".to_string()],
        })
        .await
        .unwrap()
}

/// Register a shopper with one saved address; returns the user and address ids.
async fn shopper_with_address(client: &Client) -> (UserId, AddressId) {
    let (status, body) = post(
        client,
        "/api/user/register",
        &json!({"name": "Order Tester", "email": unique_email(), "password": "Gr33nCart!"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = UserId::new(i32::try_from(body["user"]["id"].as_i64().unwrap()).unwrap());

    let (status, body) = post(
        client,
        "/api/address/add",
        &json!({"address": {
            "firstName": "Order", "lastName": "Tester", "email": "order@greencart.test",
            "street": "1 Market St", "city": "Springfield", "state": "IL",
            "zipcode": "62701", "country": "US", "phone": "+1 217 555 0100"
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let address_id =
        AddressId::new(i32::try_from(body["address"]["id"].as_i64().unwrap()).unwrap());

    (user_id, address_id)
}

async fn cart_items(client: &Client) -> Value {
    let (status, body) = get(client, "/api/user/is-auth").await;
    assert_eq!(status, StatusCode::OK);
    body["user"]["cartItems"].clone()
}

async fn fill_cart(client: &Client, product: ProductId, quantity: i32) {
    let (status, _) = post(
        client,
        "/api/cart/update",
        &json!({"cartItems": {product.to_string(): quantity}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Deliver a Stripe event signed with the server's webhook secret.
async fn deliver_webhook(event: &Value) -> StatusCode {
    let secret = std::env::var("STRIPE_WEBHOOK_SECRET")
        .expect("STRIPE_WEBHOOK_SECRET must match the running server");
    let payload = event.to_string();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = compute_signature(&secret, &timestamp, payload.as_bytes()).unwrap();

    Client::new()
        .post(format!("{}/api/order/webhook", base_url()))
        .header("content-type", "application/json")
        .header("stripe-signature", format!("t={timestamp},v1={signature}"))
        .body(payload)
        .send()
        .await
        .unwrap()
        .status()
}

async fn get(client: &Client, path: &str) -> (StatusCode, Value) {
    let response = client
        .get(format!("{}{path}", base_url()))
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_readiness() {
    let response = client()
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_shopper_session_lifecycle() {
    let client = client();
    let email = unique_email();

    let (status, body) = post(
        &client,
        "/api/user/register",
        &json!({"name": "Test Shopper", "email": email, "password": "Gr33nCart!"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], email.as_str());

    let (status, _) = post(
        &client,
        "/api/user/register",
        &json!({"name": "Test Shopper", "email": email, "password": "Gr33nCart!"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = get(&client, "/api/user/is-auth").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = post(&client, "/api/user/logout", &json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&client, "/api/user/is-auth").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(
        &client,
        "/api/user/login",
        &json!({"email": email, "password": "wrong-Passw0rd"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, _) = post(
        &client,
        "/api/user/login",
        &json!({"email": email, "password": "Gr33nCart!"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn test_address_cart_and_cod_order() {
    let pool = database().await;
    let product = seed_product(&pool).await;

    let client = client();
    let (_, address_id) = shopper_with_address(&client).await;

    let (status, body) = get(&client, "/api/address/get").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["addresses"].as_array().unwrap().len(), 1);

    fill_cart(&client, product.id, 2).await;
    assert_eq!(cart_items(&client).await[product.id.to_string()], 2);

    let (status, body) = post(
        &client,
        "/api/order/cod",
        &json!({"items": [{"product": product.id, "quantity": 2}], "address": address_id}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["orderId"].is_number());

    let (_, body) = get(&client, "/api/order/user").await;
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["paymentType"], "COD");

    assert!(cart_items(&client).await.as_object().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running server, database and webhook secret"]
async fn test_checkout_payment_is_applied_once() {
    let pool = database().await;
    let product = seed_product(&pool).await;

    let client = client();
    let (user_id, address_id) = shopper_with_address(&client).await;
    fill_cart(&client, product.id, 1).await;

    let order = OrderRepository::new(&pool)
        .create(
            user_id,
            address_id,
            product.offer_price,
            PaymentType::Online,
            &[NewOrderLine {
                product_id: product.id,
                quantity: 1,
                unit_price: product.offer_price,
            }],
        )
        .await
        .unwrap();

    // Unpaid online orders stay hidden and keep the cart
    let (_, body) = get(&client, "/api/order/user").await;
    assert!(body["orders"].as_array().unwrap().is_empty());
    assert_eq!(cart_items(&client).await[product.id.to_string()], 1);

    let event = json!({
        "id": format!("evt_e2e_{}", order.id),
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": format!("cs_test_e2e_{}", order.id),
            "payment_status": "paid",
            "metadata": {"orderId": order.id.to_string()}
        }}
    });
    assert_eq!(deliver_webhook(&event).await, StatusCode::OK);

    let (_, body) = get(&client, "/api/order/user").await;
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["isPaid"], true);
    assert!(cart_items(&client).await.as_object().unwrap().is_empty());

    // A redelivery must not touch the cart the shopper has filled since
    fill_cart(&client, product.id, 3).await;
    assert_eq!(deliver_webhook(&event).await, StatusCode::OK);

    assert_eq!(cart_items(&client).await[product.id.to_string()], 3);
    let (_, body) = get(&client, "/api/order/user").await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires a running server, database and seller credentials"]
async fn test_seller_dashboard() {
    let (Ok(email), Ok(password)) = (
        std::env::var("SELLER_EMAIL"),
        std::env::var("SELLER_PASSWORD"),
    ) else {
        return;
    };

    let client = client();
    let (status, _) = post(
        &client,
        "/api/seller/login",
        &json!({"email": email, "password": password}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&client, "/api/seller/is-auth").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&client, "/api/seller/analytics?range=7d&limit=3").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["analytics"]["summary"]["orders"].is_number());

    let (status, body) = get(&client, "/api/order/seller").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["orders"].is_array());

    let (status, _) = post(&client, "/api/seller/logout", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
}
