//! Authentication logic.
//!
//! Provides password hashing and bearer token management shared by the
//! registration, login and request-authentication flows in `chatop_api`.

pub mod jwt;
pub mod password;

use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown subject or wrong password. The two are never distinguished.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
