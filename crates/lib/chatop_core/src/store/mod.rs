//! Persistence seams for users, rentals and messages.
//!
//! `PgStore` is the production backend; `MemoryStore` backs tests and the
//! `--in-memory` server mode. Uniqueness of user emails is enforced by the
//! store itself so concurrent registrations cannot both succeed.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::{Credential, NewUser, User};
use crate::models::rental::{Message, NewMessage, NewRental, Rental, RentalChanges};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate value: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Credential store keyed by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch the credential for `email`, if any.
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Check whether an email is already registered.
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Insert a user. Fails with `StoreError::Duplicate` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
}

/// Rental listing persistence.
#[async_trait]
pub trait RentalStore: Send + Sync {
    async fn list_rentals(&self) -> Result<Vec<Rental>, StoreError>;

    async fn get_rental(&self, id: i64) -> Result<Option<Rental>, StoreError>;

    async fn create_rental(&self, rental: NewRental) -> Result<Rental, StoreError>;

    /// Apply `changes` to rental `id`, returning the updated row or `None` if absent.
    async fn update_rental(
        &self,
        id: i64,
        changes: RentalChanges,
    ) -> Result<Option<Rental>, StoreError>;
}

/// Message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError>;
}

/// Everything the API needs from a backend.
pub trait Store: UserStore + RentalStore + MessageStore {}

impl<T: UserStore + RentalStore + MessageStore> Store for T {}
