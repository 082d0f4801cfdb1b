//! In-memory store.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{MessageStore, RentalStore, StoreError, UserStore};
use crate::models::auth::{Credential, NewUser, User};
use crate::models::rental::{Message, NewMessage, NewRental, Rental, RentalChanges};

/// A user row with its password digest.
#[derive(Debug, Clone)]
struct UserRecord {
    user: User,
    password_hash: String,
}

/// Process-local store backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserRecord>,
    emails_by_id: DashMap<i64, String>,
    rentals: DashMap<i64, Rental>,
    messages: DashMap<i64, Message>,
    next_user_id: AtomicI64,
    next_rental_id: AtomicI64,
    next_message_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) + 1
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.users.get(email).map(|r| Credential {
            user_id: r.user.id,
            email: r.user.email.clone(),
            password_hash: r.password_hash.clone(),
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(email).map(|r| r.user.clone()))
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let Some(email) = self.emails_by_id.get(&id).map(|e| e.clone()) else {
            return Ok(None);
        };
        self.find_user_by_email(&email).await
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(email))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(user.email)),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let created = User {
                    id: next_id(&self.next_user_id),
                    email: user.email,
                    name: user.name,
                    created_at: now,
                    updated_at: now,
                };
                self.emails_by_id
                    .insert(created.id, created.email.clone());
                slot.insert(UserRecord {
                    user: created.clone(),
                    password_hash: user.password_hash,
                });
                Ok(created)
            }
        }
    }
}

#[async_trait]
impl RentalStore for MemoryStore {
    async fn list_rentals(&self) -> Result<Vec<Rental>, StoreError> {
        let mut rentals: Vec<Rental> = self.rentals.iter().map(|r| r.value().clone()).collect();
        rentals.sort_by_key(|r| r.id);
        Ok(rentals)
    }

    async fn get_rental(&self, id: i64) -> Result<Option<Rental>, StoreError> {
        Ok(self.rentals.get(&id).map(|r| r.clone()))
    }

    async fn create_rental(&self, rental: NewRental) -> Result<Rental, StoreError> {
        let now = Utc::now();
        let created = Rental {
            id: next_id(&self.next_rental_id),
            name: rental.name,
            surface: rental.surface,
            price: rental.price,
            picture: rental.picture,
            description: rental.description,
            owner_id: rental.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.rentals.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_rental(
        &self,
        id: i64,
        changes: RentalChanges,
    ) -> Result<Option<Rental>, StoreError> {
        Ok(self.rentals.get_mut(&id).map(|mut rental| {
            changes.apply(rental.value_mut());
            rental.updated_at = Utc::now();
            rental.clone()
        }))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let created = Message {
            id: next_id(&self.next_message_id),
            rental_id: message.rental_id,
            user_id: message.user_id,
            message: message.message,
            created_at: Utc::now(),
        };
        self.messages.insert(created.id, created.clone());
        Ok(created)
    }
}
