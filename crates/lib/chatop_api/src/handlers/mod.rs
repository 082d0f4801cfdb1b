//! Request handlers.

pub mod auth;
pub mod messages;
pub mod rentals;
pub mod users;
