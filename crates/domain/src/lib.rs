//! Domain layer for the Campus Points backend.
//!
//! This crate contains:
//! - Domain models (User, Transaction, Promotion, Event)
//! - Pure business services (access gate, points earning math)
//! - Request/response DTOs shared with the API layer

pub mod models;
pub mod services;
