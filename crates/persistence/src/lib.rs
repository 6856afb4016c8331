//! Persistence layer for the Campus Points backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the atomic ledger primitive

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
