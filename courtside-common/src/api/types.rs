//! League API request/response types
//!
//! Field names follow the server's camelCase JSON convention. Identifiers may
//! arrive as JSON strings or integers and are normalised to [`EntityId`].

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ========================================
// Identifiers
// ========================================

/// Server-assigned identifier (migration, item, player or user id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        let id = match RawId::deserialize(deserializer)? {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Signed(n) => n.to_string(),
            RawId::Unsigned(n) => n.to_string(),
        };

        if id.is_empty() {
            return Err(D::Error::custom("identifier must not be empty"));
        }
        Ok(Self(id))
    }
}

// ========================================
// Migration Types
// ========================================

/// Kind of legacy purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Program,
    Store,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Program => f.write_str("program"),
            ItemType::Store => f.write_str("store"),
        }
    }
}

/// Legacy subscription purchase record, keyed by guardian email
///
/// Created by the legacy import process and read-only to clients except
/// through assignment calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub id: EntityId,
    pub email: String,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_ids: Option<Vec<String>>,
    pub items: Vec<MigrationItem>,
}

impl MigrationRecord {
    /// Subscription ids units of this record may be billed against
    ///
    /// Falls back to a single-element list built from `stripeSubscriptionId`
    /// when the list field is absent or empty. Blank ids are dropped.
    pub fn subscription_ids(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .stripe_subscription_ids
            .iter()
            .flatten()
            .filter(|id| !id.trim().is_empty())
            .cloned()
            .collect();

        if !listed.is_empty() {
            return listed;
        }

        self.stripe_subscription_id
            .iter()
            .filter(|id| !id.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Total number of purchased units across all items
    pub fn total_units(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

/// One purchased line item within a migration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationItem {
    pub item_id: EntityId,
    pub item_type: ItemType,
    pub item_name: String,
    /// Number of fungible units; each must be assigned independently
    pub quantity: u32,
    /// Server-recorded assignments, when the server reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<UnitAssignment>>,
}

impl MigrationItem {
    /// Player the server has bound to unit `instance_index`, if reported
    pub fn assigned_player(&self, instance_index: u32) -> Option<&EntityId> {
        self.assignments
            .iter()
            .flatten()
            .find(|a| a.instance_index == instance_index)
            .map(|a| &a.player_id)
    }
}

/// Server-side binding of one item unit to a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAssignment {
    pub instance_index: u32,
    pub player_id: EntityId,
}

// ========================================
// Account Types
// ========================================

/// Authenticated guardian
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: EntityId,
    pub email: String,
}

/// Opaque account state owned by the server
///
/// Only cached and invalidated by the claim workflow; its fields are not
/// interpreted client-side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Child player on the guardian's roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
}

impl Player {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

// ========================================
// Mutation Types
// ========================================

/// `{ message }` body used for assignment success and all failures
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Bind one flattened unit to one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignUnitRequest {
    pub migration_id: EntityId,
    pub subscription_id: String,
    pub item_id: EntityId,
    pub item_type: ItemType,
    pub instance_index: u32,
    pub player_id: EntityId,
}

/// Defer assignment; carries no fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkipRequest {}

/// Add a child player to the guardian's roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlayerRequest {
    pub first_name: String,
    pub last_name: String,
}
