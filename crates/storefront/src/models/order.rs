//! Order types: requests, stored rows, and populated views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use greencart_core::{AddressId, OrderId, OrderStatus, PaymentType, ProductId, UserId};

use super::{Address, Product};

/// One requested line of an order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub product: ProductId,
    pub quantity: i64,
}

/// Body of `POST /api/order/cod` and `POST /api/order/stripe`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemInput>,
    #[serde(deserialize_with = "super::deserialize_optional_id")]
    pub address: Option<AddressId>,
}

/// A stored order row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub payment_type: PaymentType,
    pub is_paid: bool,
    pub stripe_session_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line to insert, priced at order time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// An order line with its product populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product: Product,
    pub quantity: i32,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub unit_price: Decimal,
}

/// An order with lines and address populated, as listed to users and the seller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub status: OrderStatus,
    pub payment_type: PaymentType,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLineView>,
    pub address: Address,
}

impl OrderView {
    /// Assemble a view from an order and its populated parts.
    #[must_use]
    pub fn new(order: Order, items: Vec<OrderLineView>, address: Address) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            amount: order.amount,
            status: order.status,
            payment_type: order.payment_type,
            is_paid: order.is_paid,
            paid_at: order.paid_at,
            created_at: order.created_at,
            items,
            address,
        }
    }
}

/// Body of `POST /api/order/status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub order_id: OrderId,
    pub status: OrderStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_place_order_request_accepts_string_ids() {
        let body: PlaceOrderRequest = serde_json::from_str(
            r#"{"items":[{"product":"4","quantity":2}],"address":"9"}"#,
        )
        .unwrap();
        assert_eq!(body.items.len(), 1);
        assert_eq!(body.items[0].product, ProductId::new(4));
        assert_eq!(body.address, Some(AddressId::new(9)));
    }

    #[test]
    fn test_place_order_request_defaults() {
        let body: PlaceOrderRequest = serde_json::from_str("{}").unwrap();
        assert!(body.items.is_empty());
        assert!(body.address.is_none());

        let body: PlaceOrderRequest = serde_json::from_str(r#"{"address":null}"#).unwrap();
        assert!(body.address.is_none());
    }

    #[test]
    fn test_update_status_request() {
        let body: UpdateStatusRequest =
            serde_json::from_str(r#"{"orderId":12,"status":"Out for delivery"}"#).unwrap();
        assert_eq!(body.order_id, OrderId::new(12));
        assert_eq!(body.status, OrderStatus::OutForDelivery);
    }
}
