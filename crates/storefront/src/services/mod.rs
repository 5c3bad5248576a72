//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Shopper registration/login and seller credential checks
//! - `checkout` - Order pricing and tax
//! - `cloudinary` - Product image uploads
//! - `email` - Order receipts over SMTP
//! - `product_cache` - Cached product list with write invalidation
//! - `stripe` - Checkout Sessions and webhook verification
//! - `validation` - Input validation for accounts, addresses and products

pub mod auth;
pub mod checkout;
pub mod cloudinary;
pub mod email;
pub mod product_cache;
pub mod stripe;
pub mod validation;
