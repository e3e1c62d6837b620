//! Authentication error types.

use thiserror::Error;

use haat_core::Role;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid phone number format.
    #[error("{0}")]
    InvalidPhone(#[from] haat_core::PhoneError),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] haat_core::EmailError),

    /// Phone number or password missing from the request.
    #[error("Phone number and password are required")]
    MissingCredentials,

    /// A required registration field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Invalid credentials (wrong password or account not found).
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// An account with this phone number or email already exists.
    #[error("{0} already exists")]
    AccountExists(&'static str),

    /// The account was disabled by an administrator.
    #[error("Account is disabled")]
    AccountDisabled,

    /// The account behind a valid token no longer exists.
    #[error("Account not found")]
    AccountNotFound,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// No bearer token on the request.
    #[error("Authentication required")]
    MissingToken,

    /// Token signature or claims are invalid.
    #[error("Invalid token")]
    InvalidToken,

    /// Token lifetime is over.
    #[error("Token expired")]
    ExpiredToken,

    /// Token was minted for another role.
    #[error("Access denied: {expected} token required")]
    WrongRole {
        /// Role the route requires.
        expected: Role,
    },

    /// Token could not be signed.
    #[error("token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
