//! Stripe API client and webhook verification.
//!
//! Only the two Checkout Session endpoints the storefront needs are wrapped:
//! creating a session for an online order, and finding the session behind a
//! payment intent. Requests are form-encoded as Stripe expects.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use greencart_core::{CurrencyCode, OrderId, UserId};

use crate::config::StripeConfig;
use crate::services::auth::constant_time_compare;

/// Maximum age of a webhook signature, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Metadata key carrying the order ID.
pub const METADATA_ORDER_ID: &str = "orderId";

/// Metadata key carrying the user ID.
pub const METADATA_USER_ID: &str = "userId";

/// Errors that can occur when interacting with Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or event.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Webhook signature missing, malformed, stale or wrong.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// One line of a Checkout Session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Per-unit amount in minor units, tax included.
    pub unit_amount: i64,
    pub quantity: i32,
}

/// Parameters for creating a Checkout Session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams<'a> {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub customer_email: Option<&'a str>,
    pub currency: CurrencyCode,
    pub line_items: &'a [CheckoutLineItem],
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

impl CheckoutSessionParams<'_> {
    /// Flatten into Stripe's bracketed form encoding.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.to_string()),
            ("cancel_url".to_string(), self.cancel_url.to_string()),
            (
                "client_reference_id".to_string(),
                self.order_id.to_string(),
            ),
            (
                format!("metadata[{METADATA_ORDER_ID}]"),
                self.order_id.to_string(),
            ),
            (
                format!("metadata[{METADATA_USER_ID}]"),
                self.user_id.to_string(),
            ),
            (
                format!("payment_intent_data[metadata][{METADATA_ORDER_ID}]"),
                self.order_id.to_string(),
            ),
            (
                format!("payment_intent_data[metadata][{METADATA_USER_ID}]"),
                self.user_id.to_string(),
            ),
        ];

        if let Some(email) = self.customer_email {
            form.push(("customer_email".to_string(), email.to_string()));
        }

        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.as_stripe_code().to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        form
    }
}

/// The fields of a Checkout Session the storefront reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page; present while the session is open.
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Whether Stripe reports the session as paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// The order this session was created for.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        metadata_order_id(&self.metadata)
    }
}

/// The fields of a `PaymentIntent` the storefront reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The order recorded on the intent (set through `payment_intent_data`).
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        metadata_order_id(&self.metadata)
    }
}

fn metadata_order_id(metadata: &HashMap<String, String>) -> Option<OrderId> {
    metadata
        .get(METADATA_ORDER_ID)
        .and_then(|raw| raw.parse::<OrderId>().ok())
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// Deserialize `data.object` into a concrete Stripe object.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Parse` if the object does not have the expected shape.
    pub fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, StripeError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| StripeError::Parse(format!("{} object: {e}", self.event_type)))
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    webhook_secret: SecretString,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    /// Create a Checkout Session in `payment` mode.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or the response cannot be parsed.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = self.client.post(&url).form(&params.to_form()).send().await?;
        let session: CheckoutSession = parse_response(response).await?;

        debug!(order_id = %params.order_id, session_id = %session.id, "Created checkout session");
        Ok(session)
    }

    /// Find the Checkout Session that produced a payment intent.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or the response cannot be parsed.
    pub async fn find_session_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<CheckoutSession>, StripeError> {
        let url = url::Url::parse_with_params(
            &format!("{}/v1/checkout/sessions", self.api_base),
            &[("payment_intent", payment_intent_id), ("limit", "1")],
        )
        .map_err(|e| StripeError::Parse(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        let list: ListResponse<CheckoutSession> = parse_response(response).await?;
        Ok(list.data.into_iter().next())
    }

    /// Verify a webhook signature and parse the event.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidSignature` if verification fails and
    /// `StripeError::Parse` if the verified payload is not an event.
    pub fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<Event, StripeError> {
        verify_signature(
            self.webhook_secret.expose_secret(),
            payload,
            signature_header,
            now,
        )?;
        serde_json::from_slice(payload).map_err(|e| StripeError::Parse(e.to_string()))
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return Err(StripeError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| StripeError::Parse(e.to_string()))
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
///
/// The expected signature is HMAC-SHA256 of `"{t}.{payload}"` keyed with the
/// endpoint secret. Any matching `v1` entry is accepted; the timestamp must
/// be within [`WEBHOOK_TOLERANCE_SECS`] of `now`.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` describing the first failed check.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("Missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature(
            "No v1 signatures".to_string(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature("Invalid timestamp".to_string()))?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(StripeError::InvalidSignature(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_signature(secret, timestamp, payload)?;

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature(
            "Signature mismatch".to_string(),
        ))
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` if the key is rejected by HMAC.
pub fn compute_signature(
    secret: &str,
    timestamp: &str,
    payload: &[u8],
) -> Result<String, StripeError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn header_for(payload: &[u8], ts: i64) -> String {
        let sig = compute_signature(SECRET, &ts.to_string(), payload).unwrap();
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn test_verify_signature_accepts_valid() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = header_for(payload, NOW);
        assert!(verify_signature(SECRET, payload, &header, NOW + 10).is_ok());
    }

    #[test]
    fn test_verify_signature_accepts_any_matching_v1() {
        let payload = b"{}";
        let good = compute_signature(SECRET, &NOW.to_string(), payload).unwrap();
        let header = format!("t={NOW},v1={},v1={good},v0=legacy", "0".repeat(64));
        assert!(verify_signature(SECRET, payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_verify_signature_rejects_tampered_payload() {
        let header = header_for(b"{\"amount\":100}", NOW);
        let result = verify_signature(SECRET, b"{\"amount\":1}", &header, NOW);
        assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
    }

    #[test]
    fn test_verify_signature_rejects_wrong_secret() {
        let payload = b"{}";
        let header = header_for(payload, NOW);
        assert!(verify_signature("whsec_other", payload, &header, NOW).is_err());
    }

    #[test]
    fn test_verify_signature_rejects_stale_timestamp() {
        let payload = b"{}";
        let header = header_for(payload, NOW - WEBHOOK_TOLERANCE_SECS - 1);
        let result = verify_signature(SECRET, payload, &header, NOW);
        assert!(matches!(result, Err(StripeError::InvalidSignature(msg)) if msg.contains("tolerance")));
    }

    #[test]
    fn test_verify_signature_rejects_malformed_headers() {
        assert!(verify_signature(SECRET, b"{}", "", NOW).is_err());
        assert!(verify_signature(SECRET, b"{}", "v1=abc", NOW).is_err());
        assert!(verify_signature(SECRET, b"{}", &format!("t={NOW}"), NOW).is_err());
        assert!(verify_signature(SECRET, b"{}", "t=soon,v1=abc", NOW).is_err());
    }

    #[test]
    fn test_checkout_form_encoding() {
        let items = vec![
            CheckoutLineItem {
                name: "Organic Apples".to_string(),
                unit_amount: 1120,
                quantity: 2,
            },
            CheckoutLineItem {
                name: "Carrots".to_string(),
                unit_amount: 510,
                quantity: 1,
            },
        ];
        let params = CheckoutSessionParams {
            order_id: OrderId::new(42),
            user_id: UserId::new(7),
            customer_email: Some("ada@example.com"),
            currency: CurrencyCode::USD,
            line_items: &items,
            success_url: "http://localhost:5173/loader?next=my-orders",
            cancel_url: "http://localhost:5173/cart",
        };
        let form: HashMap<String, String> = params.to_form().into_iter().collect();

        assert_eq!(form["mode"], "payment");
        assert_eq!(form["metadata[orderId]"], "42");
        assert_eq!(form["metadata[userId]"], "7");
        assert_eq!(form["payment_intent_data[metadata][orderId]"], "42");
        assert_eq!(form["line_items[0][price_data][currency]"], "usd");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "1120");
        assert_eq!(form["line_items[0][quantity]"], "2");
        assert_eq!(form["line_items[1][price_data][product_data][name]"], "Carrots");
        assert_eq!(form["customer_email"], "ada@example.com");
    }

    #[test]
    fn test_event_object_parsing() {
        let event: Event = serde_json::from_str(
            r#"{
                "id": "evt_1",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "id": "cs_test_1",
                    "url": null,
                    "payment_status": "paid",
                    "payment_intent": "pi_1",
                    "metadata": {"orderId": "42", "userId": "7"}
                }}
            }"#,
        )
        .unwrap();

        let session: CheckoutSession = event.object().unwrap();
        assert!(session.is_paid());
        assert_eq!(session.order_id(), Some(OrderId::new(42)));
        assert_eq!(session.payment_intent.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_payment_intent_without_metadata() {
        let intent: PaymentIntent = serde_json::from_str(r#"{"id":"pi_1"}"#).unwrap();
        assert_eq!(intent.order_id(), None);
    }
}
