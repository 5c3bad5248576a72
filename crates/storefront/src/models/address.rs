//! Address book types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use greencart_core::{AddressId, UserId};

/// A saved delivery address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// Multi-line rendering used in receipts.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("{} {}", self.first_name, self.last_name),
            self.street.clone(),
            format!("{}, {} {}", self.city, self.state, self.zipcode),
            self.country.clone(),
            self.phone.clone(),
        ]
    }
}

/// Address as submitted by the SPA. Missing fields become empty strings and
/// are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(alias = "zipCode")]
    pub zipcode: String,
    pub country: String,
    pub phone: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_input_tolerates_missing_fields() {
        let input: AddressInput = serde_json::from_str(r#"{"firstName":"Ada"}"#).unwrap();
        assert_eq!(input.first_name, "Ada");
        assert!(input.street.is_empty());
    }

    #[test]
    fn test_address_input_accepts_zip_code_alias() {
        let input: AddressInput = serde_json::from_str(r#"{"zipCode":"10001"}"#).unwrap();
        assert_eq!(input.zipcode, "10001");
    }
}
