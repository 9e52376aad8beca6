//! Boundary decoding for league API payloads
//!
//! Every response is decoded into its endpoint's explicit type and then
//! validated. Malformed payloads are rejected here rather than trusted at
//! use sites.

use serde::de::DeserializeOwned;
use std::collections::HashSet;

use super::types::{
    AccountInfo, CurrentUser, MessageResponse, MigrationItem, MigrationRecord, Player,
};
use crate::{Error, Result};

/// Semantic checks serde cannot express
pub trait Validate {
    /// Returns a human-readable reason when the value is unusable
    fn validate(&self) -> std::result::Result<(), String>;
}

/// Decode and validate a response body received from `endpoint`
pub fn decode_payload<T>(endpoint: &str, body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(body).map_err(|e| Error::MalformedPayload {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    value.validate().map_err(|reason| Error::MalformedPayload {
        endpoint: endpoint.to_string(),
        reason,
    })?;

    Ok(value)
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> std::result::Result<(), String> {
        for (index, entry) in self.iter().enumerate() {
            entry
                .validate()
                .map_err(|reason| format!("entry {}: {}", index, reason))?;
        }
        Ok(())
    }
}

impl Validate for MigrationRecord {
    fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert(item.item_id.as_str()) {
                return Err(format!(
                    "migration {} lists item {} more than once",
                    self.id, item.item_id
                ));
            }
            item.validate()
                .map_err(|reason| format!("migration {}: {}", self.id, reason))?;
        }

        if self.total_units() > 0 && self.subscription_ids().is_empty() {
            return Err(format!(
                "migration {} has purchased units but no subscription id",
                self.id
            ));
        }

        Ok(())
    }
}

impl Validate for MigrationItem {
    fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for assignment in self.assignments.iter().flatten() {
            if assignment.instance_index >= self.quantity {
                return Err(format!(
                    "item {} reports an assignment for unit {} but quantity is {}",
                    self.item_id, assignment.instance_index, self.quantity
                ));
            }
            if !seen.insert(assignment.instance_index) {
                return Err(format!(
                    "item {} reports unit {} assigned twice",
                    self.item_id, assignment.instance_index
                ));
            }
        }
        Ok(())
    }
}

impl Validate for CurrentUser {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.email.trim().is_empty() {
            return Err(format!("user {} has no email", self.id));
        }
        Ok(())
    }
}

impl Validate for Player {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl Validate for AccountInfo {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl Validate for MessageResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}
