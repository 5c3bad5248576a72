//! Stripe webhook handler.
//!
//! The body is taken as raw bytes and verified against `Stripe-Signature`
//! before it is parsed. Marking an order paid is a conditional update, so
//! redelivered events are acknowledged without repeating side effects.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use greencart_core::OrderId;

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::routes::order::send_receipt_in_background;
use crate::services::stripe::{CheckoutSession, Event, PaymentIntent, StripeError};
use crate::state::AppState;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// `{received: true}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// What an event type means for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    /// Checkout finished; paid only if `payment_status` says so.
    SessionCompleted,
    /// Delayed payment method settled.
    SessionPaid,
    /// Payment intent succeeded; find its Checkout Session.
    IntentSucceeded,
    /// Checkout expired or its delayed payment failed.
    SessionFailed,
    /// A payment attempt failed. Checkout keeps the session open for a retry
    /// on the same intent, so the order stays.
    IntentFailed,
    /// Not relevant to orders.
    Ignore,
}

impl WebhookAction {
    /// Classify a Stripe event type.
    #[must_use]
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => Self::SessionCompleted,
            "checkout.session.async_payment_succeeded" => Self::SessionPaid,
            "payment_intent.succeeded" => Self::IntentSucceeded,
            "checkout.session.expired" | "checkout.session.async_payment_failed" => {
                Self::SessionFailed
            }
            "payment_intent.payment_failed" => Self::IntentFailed,
            _ => Self::Ignore,
        }
    }
}

/// Receive a Stripe event.
///
/// POST /api/order/webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| StripeError::InvalidSignature("missing Stripe-Signature header".into()))?;

    let event = state
        .stripe()
        .construct_event(&body, signature, Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!("Rejected webhook: {e}");
            match e {
                StripeError::Parse(msg) => AppError::BadRequest(format!("Malformed event: {msg}")),
                other => other.into(),
            }
        })?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe event received");
    handle_event(&state, &event).await?;

    Ok(Json(WebhookAck { received: true }))
}

async fn handle_event(state: &AppState, event: &Event) -> Result<(), AppError> {
    match WebhookAction::from_event_type(&event.event_type) {
        WebhookAction::SessionCompleted => {
            let session: CheckoutSession = event_object(event)?;
            if session.is_paid() {
                mark_paid(state, session.order_id(), Some(&session.id)).await?;
            } else {
                tracing::info!(session_id = %session.id, "Checkout completed, payment pending");
            }
        }
        WebhookAction::SessionPaid => {
            let session: CheckoutSession = event_object(event)?;
            mark_paid(state, session.order_id(), Some(&session.id)).await?;
        }
        WebhookAction::IntentSucceeded => {
            let intent: PaymentIntent = event_object(event)?;
            match state.stripe().find_session_by_payment_intent(&intent.id).await? {
                Some(session) => {
                    mark_paid(state, session.order_id(), Some(&session.id)).await?;
                }
                None => mark_paid(state, intent.order_id(), None).await?,
            }
        }
        WebhookAction::SessionFailed => {
            let session: CheckoutSession = event_object(event)?;
            cancel_unpaid(state, session.order_id()).await?;
        }
        WebhookAction::IntentFailed => {
            let intent: PaymentIntent = event_object(event)?;
            tracing::info!(
                payment_intent = %intent.id,
                order_id = ?intent.order_id(),
                "Payment attempt failed, awaiting retry or expiry"
            );
        }
        WebhookAction::Ignore => {
            tracing::debug!(event_type = %event.event_type, "Ignoring Stripe event");
        }
    }
    Ok(())
}

fn event_object<T: serde::de::DeserializeOwned>(event: &Event) -> Result<T, AppError> {
    event
        .object()
        .map_err(|e| AppError::BadRequest(format!("Malformed {} event: {e}", event.event_type)))
}

async fn mark_paid(
    state: &AppState,
    order_id: Option<OrderId>,
    session_id: Option<&str>,
) -> Result<(), AppError> {
    let Some(order_id) = order_id else {
        tracing::warn!("Paid event without orderId metadata");
        return Ok(());
    };

    match OrderRepository::new(state.pool())
        .mark_paid(order_id, session_id)
        .await?
    {
        Some(order) => {
            tracing::info!(order_id = %order.id, amount = %order.amount, "Order paid");
            send_receipt_in_background(state, order.id);
        }
        None => {
            tracing::debug!(order_id = %order_id, "Order already paid or unknown");
        }
    }
    Ok(())
}

async fn cancel_unpaid(state: &AppState, order_id: Option<OrderId>) -> Result<(), AppError> {
    let Some(order_id) = order_id else {
        return Ok(());
    };

    if OrderRepository::new(state.pool())
        .delete_unpaid(order_id)
        .await?
    {
        tracing::info!(order_id = %order_id, "Removed unpaid order");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        assert_eq!(
            WebhookAction::from_event_type("checkout.session.completed"),
            WebhookAction::SessionCompleted
        );
        assert_eq!(
            WebhookAction::from_event_type("checkout.session.async_payment_succeeded"),
            WebhookAction::SessionPaid
        );
        assert_eq!(
            WebhookAction::from_event_type("payment_intent.succeeded"),
            WebhookAction::IntentSucceeded
        );
        assert_eq!(
            WebhookAction::from_event_type("checkout.session.expired"),
            WebhookAction::SessionFailed
        );
        assert_eq!(
            WebhookAction::from_event_type("checkout.session.async_payment_failed"),
            WebhookAction::SessionFailed
        );
        assert_eq!(
            WebhookAction::from_event_type("payment_intent.payment_failed"),
            WebhookAction::IntentFailed
        );
        assert_eq!(
            WebhookAction::from_event_type("charge.refunded"),
            WebhookAction::Ignore
        );
    }
}
