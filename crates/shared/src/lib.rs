//! Shared utilities and common types for the Campus Points backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Offset pagination types and the list envelope
//! - Common validation logic (utorid, currency amounts, time windows)
//! - Bearer-token verification (token issuance lives outside this service)

pub mod jwt;
pub mod pagination;
pub mod validation;
