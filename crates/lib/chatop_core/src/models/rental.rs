//! Rental listing and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rental listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rental {
    pub id: i64,
    pub name: String,
    pub surface: f64,
    pub price: f64,
    /// Public URL of the stored picture.
    pub picture: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a rental.
#[derive(Debug, Clone)]
pub struct NewRental {
    pub name: String,
    pub surface: f64,
    pub price: f64,
    pub picture: String,
    pub description: Option<String>,
    pub owner_id: i64,
}

/// Partial update for a rental. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct RentalChanges {
    pub name: Option<String>,
    pub surface: Option<f64>,
    pub price: Option<f64>,
    pub picture: Option<String>,
    pub description: Option<String>,
}

impl RentalChanges {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.surface.is_none()
            && self.price.is_none()
            && self.picture.is_none()
            && self.description.is_none()
    }

    /// Apply the changes to `rental` in place.
    pub fn apply(self, rental: &mut Rental) {
        if let Some(name) = self.name {
            rental.name = name;
        }
        if let Some(surface) = self.surface {
            rental.surface = surface;
        }
        if let Some(price) = self.price {
            rental.price = price;
        }
        if let Some(picture) = self.picture {
            rental.picture = picture;
        }
        if let Some(description) = self.description {
            rental.description = Some(description);
        }
    }
}

/// A message sent about a rental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub rental_id: i64,
    pub user_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub rental_id: i64,
    pub user_id: i64,
    pub message: String,
}
