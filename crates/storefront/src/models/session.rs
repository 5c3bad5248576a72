//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use greencart_core::{Email, UserId};

/// Session-stored shopper identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's display name.
    pub name: String,
    /// User's email address.
    pub email: Email,
}

/// Session-stored seller identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSeller {
    /// Seller email the session was opened with.
    pub email: Email,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in shopper.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for storing the current logged-in seller.
    pub const CURRENT_SELLER: &str = "current_seller";
}
