//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::validation::ValidationError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Name, email or password failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Seller email or password does not match configuration.
    #[error("invalid seller credentials")]
    InvalidSellerCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
