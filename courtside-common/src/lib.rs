//! # Courtside Common Library
//!
//! Shared code for the Courtside league tools including:
//! - League API wire types with boundary validation
//! - Configuration loading
//! - Claim workflow event types (ClaimEvent enum) and EventBus
//! - Common error types

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
