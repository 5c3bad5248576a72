//! Authentication service.
//!
//! Shopper accounts use argon2 password hashes stored in `storefront.user`.
//! The seller is a single account whose credentials come from configuration.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::ExposeSecret;
use sqlx::PgPool;

use greencart_core::Email;

use crate::config::SellerConfig;
use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::User;
use crate::services::validation::{validate_email, validate_name, validate_password};

/// Authentication service.
///
/// Handles shopper registration and login.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new shopper.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the name, email or password is invalid.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let name = validate_name(name)?;
        let email = validate_email(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(&name, &email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }
}

/// Check seller credentials against configuration.
///
/// # Errors
///
/// Returns `AuthError::InvalidSellerCredentials` if either value does not match.
pub fn verify_seller(seller: &SellerConfig, email: &str, password: &str) -> Result<Email, AuthError> {
    let email = Email::parse(email).map_err(|_| AuthError::InvalidSellerCredentials)?;

    // Both comparisons always run
    let email_ok = constant_time_compare(email.as_str(), seller.email.as_str());
    let password_ok = constant_time_compare(password, seller.password.expose_secret());

    if email_ok & password_ok {
        Ok(email)
    } else {
        Err(AuthError::InvalidSellerCredentials)
    }
}

/// Hash a password with Argon2id and a random salt.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Compare two strings without short-circuiting on the first differing byte.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn seller() -> SellerConfig {
        SellerConfig {
            email: Email::parse("seller@greencart.dev").unwrap(),
            password: SecretString::from("greenGrocer42"),
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("Greener42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Greener42", &hash).is_ok());
        assert!(matches!(
            verify_password("Greener43", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("Greener42", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_seller() {
        let seller = seller();
        assert!(verify_seller(&seller, " Seller@GreenCart.dev ", "greenGrocer42").is_ok());
        assert!(matches!(
            verify_seller(&seller, "seller@greencart.dev", "wrong"),
            Err(AuthError::InvalidSellerCredentials)
        ));
        assert!(verify_seller(&seller, "other@greencart.dev", "greenGrocer42").is_err());
        assert!(verify_seller(&seller, "", "greenGrocer42").is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
