//! Domain models for storefront.
//!
//! Row types derive `sqlx::FromRow` and double as the JSON shape returned to
//! the SPA (camelCase keys, prices as JSON numbers).

pub mod address;
pub mod analytics;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput};
pub use order::{Order, OrderItemInput, OrderLineView, OrderView, PlaceOrderRequest};
pub use product::{NewProduct, Product, ProductData};
pub use session::{CurrentSeller, CurrentUser, keys as session_keys};
pub use user::{User, UserProfile};

use serde::{Deserialize, Deserializer};

/// An identifier as the SPA may send it: a JSON number or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

/// Deserialize a newtype ID from either `7` or `"7"`.
pub(crate) fn deserialize_id<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<i32>,
{
    let raw = match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n,
        RawId::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid id: {s}")))?,
    };
    i32::try_from(raw)
        .ok()
        .filter(|id| *id > 0)
        .map(T::from)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid id: {raw}")))
}

/// Like [`deserialize_id`] but tolerates a missing or null value.
pub(crate) fn deserialize_optional_id<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<i32>,
{
    #[derive(Deserialize)]
    struct Wrapper<T: From<i32>>(#[serde(deserialize_with = "deserialize_id")] T);

    Option::<Wrapper<T>>::deserialize(deserializer).map(|w| w.map(|Wrapper(id)| id))
}
