//! League API wire types shared by Courtside clients
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Request/response types for the league REST API
//! - Pure decoding and validation functions (no HTTP client dependencies)
//!
//! Clients wrap these with their transport of choice (reqwest, test stubs).

pub mod decode;
pub mod types;

pub use decode::{decode_payload, Validate};
pub use types::{
    AccountInfo, AssignUnitRequest, CreatePlayerRequest, CurrentUser, EntityId, ItemType,
    MessageResponse, MigrationItem, MigrationRecord, Player, SkipRequest, UnitAssignment,
};
