//! User domain types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use greencart_core::{Email, ProductId, UserId};

use super::session::CurrentUser;

/// A storefront shopper (domain type).
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// User's email address.
    pub email: Email,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Public view of a user returned by the auth endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    /// Only populated by `is-auth`, which the SPA uses to restore the cart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_items: Option<HashMap<ProductId, i32>>,
}

impl UserProfile {
    /// Attach the user's cart.
    #[must_use]
    pub fn with_cart(mut self, cart_items: HashMap<ProductId, i32>) -> Self {
        self.cart_items = Some(cart_items);
        self
    }
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            cart_items: None,
        }
    }
}

impl From<&CurrentUser> for UserProfile {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            cart_items: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_serializes_cart_keys_as_strings() {
        let current = CurrentUser {
            id: UserId::new(3),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
        };
        let profile =
            UserProfile::from(&current).with_cart(HashMap::from([(ProductId::new(12), 2)]));

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["cartItems"]["12"], 2);
    }

    #[test]
    fn test_profile_omits_cart_when_absent() {
        let current = CurrentUser {
            id: UserId::new(3),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
        };
        let json = serde_json::to_value(UserProfile::from(&current)).unwrap();
        assert!(json.get("cartItems").is_none());
    }
}
