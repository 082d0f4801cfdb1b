//! Request and response bodies.

use chatop_core::models::auth::User;
use chatop_core::models::rental::Rental;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date format used in response bodies.
const DATE_FORMAT: &str = "%Y/%m/%d";

fn format_date(at: &DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// `{ "token": "..." }` returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: format_date(&user.created_at),
            updated_at: format_date(&user.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalResponse {
    pub id: i64,
    pub name: String,
    pub surface: f64,
    pub price: f64,
    pub picture: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Rental> for RentalResponse {
    fn from(rental: Rental) -> Self {
        Self {
            created_at: format_date(&rental.created_at),
            updated_at: format_date(&rental.updated_at),
            id: rental.id,
            name: rental.name,
            surface: rental.surface,
            price: rental.price,
            picture: rental.picture,
            description: rental.description,
            owner_id: rental.owner_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalListResponse {
    pub rentals: Vec<RentalResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageRequest {
    pub rental_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Plain `{ "message": "..." }` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
