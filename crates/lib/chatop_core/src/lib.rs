//! # chatop_core
//!
//! Core domain logic for ChaTop.

pub mod auth;
pub mod models;
pub mod store;
pub mod uploads;
