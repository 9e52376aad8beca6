//! Item flattener
//!
//! Expands quantity-bearing migration items into individually assignable
//! units. Output order is record order, then item order, then instance
//! order. Flattening is pure: the same input always yields the same list.

use courtside_common::api::{EntityId, ItemType, MigrationItem, MigrationRecord};
use std::collections::HashSet;

use crate::error::{ClaimError, ClaimResult};

/// One assignable instance of a purchased item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedUnit {
    pub migration_id: EntityId,
    pub subscription_id: String,
    pub item_id: EntityId,
    pub item_type: ItemType,
    pub item_name: String,
    pub instance_index: u32,
    /// `{migrationId}-{itemId}-{instanceIndex}`
    pub unique_key: String,
}

impl FlattenedUnit {
    /// Short label for listings, e.g. `Youth Club #2`
    pub fn label(&self) -> String {
        format!("{} #{}", self.item_name, self.instance_index + 1)
    }
}

/// Composite key of one unit
pub fn unit_key(migration_id: &EntityId, item_id: &EntityId, instance_index: u32) -> String {
    format!("{}-{}-{}", migration_id, item_id, instance_index)
}

/// Where a unit sits while it is being flattened
#[derive(Debug, Clone, Copy)]
pub struct UnitPosition<'a> {
    pub record: &'a MigrationRecord,
    pub item: &'a MigrationItem,
    pub instance_index: u32,
    /// Index of the unit in the overall flattened sequence
    pub global_position: usize,
}

/// Chooses which subscription a unit is billed against
///
/// Which subscription a legacy unit really belongs to is not recorded in
/// the migration data, so the choice is pluggable.
pub trait SubscriptionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pick one of `subscription_ids` (never empty) for the unit at `position`
    fn select<'a>(&self, subscription_ids: &'a [String], position: &UnitPosition<'_>) -> &'a str;
}

/// Legacy heuristic: global unit position modulo the number of subscriptions
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinByPosition;

impl SubscriptionStrategy for RoundRobinByPosition {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn select<'a>(&self, subscription_ids: &'a [String], position: &UnitPosition<'_>) -> &'a str {
        &subscription_ids[position.global_position % subscription_ids.len()]
    }
}

/// Every unit goes to the record's first subscription
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSubscription;

impl SubscriptionStrategy for FirstSubscription {
    fn name(&self) -> &'static str {
        "first"
    }

    fn select<'a>(&self, subscription_ids: &'a [String], _position: &UnitPosition<'_>) -> &'a str {
        &subscription_ids[0]
    }
}

/// Flatten migration records into assignable units
///
/// Fails when a record has units but no subscription id, or when two units
/// would share a `unique_key`.
pub fn flatten(
    records: &[MigrationRecord],
    strategy: &dyn SubscriptionStrategy,
) -> ClaimResult<Vec<FlattenedUnit>> {
    let mut units = Vec::new();
    let mut seen = HashSet::new();

    for record in records {
        let subscription_ids = record.subscription_ids();

        for item in &record.items {
            if item.quantity > 0 && subscription_ids.is_empty() {
                return Err(courtside_common::Error::MalformedPayload {
                    endpoint: "migrations".to_string(),
                    reason: format!("migration {} has no subscription id", record.id),
                }
                .into());
            }

            for instance_index in 0..item.quantity {
                let position = UnitPosition {
                    record,
                    item,
                    instance_index,
                    global_position: units.len(),
                };
                let subscription_id = strategy.select(&subscription_ids, &position).to_string();
                let unique_key = unit_key(&record.id, &item.item_id, instance_index);

                if !seen.insert(unique_key.clone()) {
                    return Err(ClaimError::DuplicateUnitKey(unique_key));
                }

                units.push(FlattenedUnit {
                    migration_id: record.id.clone(),
                    subscription_id,
                    item_id: item.item_id.clone(),
                    item_type: item.item_type,
                    item_name: item.item_name.clone(),
                    instance_index,
                    unique_key,
                });
            }
        }
    }

    Ok(units)
}
