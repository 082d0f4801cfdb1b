//! Domain models shared across the API and storage layers.

pub mod auth;
pub mod rental;
