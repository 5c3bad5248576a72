//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use greencart_core::ProductId;

/// A catalog product as stored and as returned to clients.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Bullet points shown on the product page.
    pub description: Vec<String>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub offer_price: Decimal,
    /// Cloudinary `secure_url`s, first one is the cover image.
    pub images: Vec<String>,
    pub category: String,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The `productData` JSON part of the add-product form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Description,
    #[serde(default)]
    pub category: String,
    pub price: Decimal,
    pub offer_price: Decimal,
}

/// Description as either a list of lines or one newline-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Lines(Vec<String>),
    Text(String),
}

impl Default for Description {
    fn default() -> Self {
        Self::Lines(Vec::new())
    }
}

impl Description {
    /// Non-empty, trimmed description lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        let lines = match self {
            Self::Lines(lines) => lines,
            Self::Text(text) => text.lines().map(String::from).collect(),
        };
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// A validated product ready to insert.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Vec<String>,
    pub category: String,
    pub price: Decimal,
    pub offer_price: Decimal,
    pub images: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_data_accepts_numbers_and_strings() {
        let data: ProductData = serde_json::from_str(
            r#"{"name":"Apple","description":["Fresh","Crisp"],"category":"Fruits","price":"4.50","offerPrice":3.99}"#,
        )
        .unwrap();
        assert_eq!(data.price, Decimal::new(450, 2));
        assert_eq!(data.offer_price, Decimal::new(399, 2));
        assert_eq!(data.description.into_lines(), vec!["Fresh", "Crisp"]);
    }

    #[test]
    fn test_description_text_is_split_into_lines() {
        let description = Description::Text("Organic\n\n  Locally grown \n".to_string());
        assert_eq!(description.into_lines(), vec!["Organic", "Locally grown"]);
    }
}
