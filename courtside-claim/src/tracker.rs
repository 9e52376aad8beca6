//! Assignment tracker and partitioning
//!
//! The session's view of which units are assigned is an [`AssignmentMap`]
//! changed only through [`apply`]. Partitions are recomputed from the
//! current units and map every time they are requested.

use courtside_common::api::{EntityId, MigrationRecord};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::flatten::{unit_key, FlattenedUnit};

/// `unique_key -> player_id`
pub type AssignmentMap = BTreeMap<String, EntityId>;

/// Server-reported truth for the units of items the server reports on
///
/// `None` means the server reports the unit as unassigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerAssignments {
    pub reported: BTreeMap<String, Option<EntityId>>,
}

/// Changes to the assignment map
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentEvent {
    /// Server acknowledged binding `unique_key` to `player_id`
    Assigned {
        unique_key: String,
        player_id: EntityId,
    },
    /// Replace local entries with server truth where the server reports
    Reconciled { server: ServerAssignments },
    /// Forget every local assignment
    Reset,
}

/// Pure reducer: the map after `event`
pub fn apply(map: &AssignmentMap, event: &AssignmentEvent) -> AssignmentMap {
    match event {
        AssignmentEvent::Assigned {
            unique_key,
            player_id,
        } => {
            let mut next = map.clone();
            next.insert(unique_key.clone(), player_id.clone());
            next
        }
        AssignmentEvent::Reconciled { server } => {
            let mut next = map.clone();
            for (key, player) in &server.reported {
                match player {
                    Some(player_id) => {
                        next.insert(key.clone(), player_id.clone());
                    }
                    None => {
                        next.remove(key);
                    }
                }
            }
            next
        }
        AssignmentEvent::Reset => AssignmentMap::new(),
    }
}

/// Extract server truth from the `assignments` reported on items
///
/// Only units present in `units` are reported; items without the field are
/// left out entirely so local entries for them survive reconciliation.
pub fn server_assignments(records: &[MigrationRecord], units: &[FlattenedUnit]) -> ServerAssignments {
    let known: HashSet<&str> = units.iter().map(|u| u.unique_key.as_str()).collect();
    let mut reported = BTreeMap::new();

    for record in records {
        for item in &record.items {
            if item.assignments.is_none() {
                continue;
            }
            for instance_index in 0..item.quantity {
                let key = unit_key(&record.id, &item.item_id, instance_index);
                if !known.contains(key.as_str()) {
                    continue;
                }
                let player = item.assigned_player(instance_index).cloned();
                reported.insert(key, player);
            }
        }
    }

    ServerAssignments { reported }
}

/// Number of keys whose binding differs between two maps
pub fn diff_count(before: &AssignmentMap, after: &AssignmentMap) -> usize {
    let changed_or_removed = before
        .iter()
        .filter(|(key, player)| after.get(*key) != Some(*player))
        .count();
    let added = after.keys().filter(|key| !before.contains_key(*key)).count();
    changed_or_removed + added
}

/// A unit together with the player it is bound to
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedUnit {
    pub unit: FlattenedUnit,
    pub player_id: EntityId,
}

/// Disjoint, exhaustive split of the flattened units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub unassigned: Vec<FlattenedUnit>,
    pub assigned: Vec<AssignedUnit>,
}

impl Partition {
    pub fn total(&self) -> usize {
        self.unassigned.len() + self.assigned.len()
    }

    pub fn is_complete(&self) -> bool {
        self.unassigned.is_empty()
    }

    pub fn find_unassigned(&self, unique_key: &str) -> Option<&FlattenedUnit> {
        self.unassigned.iter().find(|u| u.unique_key == unique_key)
    }

    pub fn player_for(&self, unique_key: &str) -> Option<&EntityId> {
        self.assigned
            .iter()
            .find(|a| a.unit.unique_key == unique_key)
            .map(|a| &a.player_id)
    }
}

/// Split `units` by presence of their key in `map`, preserving order
pub fn partition(units: &[FlattenedUnit], map: &AssignmentMap) -> Partition {
    let mut result = Partition::default();
    for unit in units {
        match map.get(&unit.unique_key) {
            Some(player_id) => result.assigned.push(AssignedUnit {
                unit: unit.clone(),
                player_id: player_id.clone(),
            }),
            None => result.unassigned.push(unit.clone()),
        }
    }
    result
}

/// Session-owned holder of the assignment map
///
/// Only [`AssignmentStore::dispatch`] changes the map.
#[derive(Debug, Default)]
pub struct AssignmentStore {
    map: RwLock<AssignmentMap>,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` and return the resulting map
    pub async fn dispatch(&self, event: &AssignmentEvent) -> AssignmentMap {
        let mut map = self.map.write().await;
        *map = apply(&map, event);
        map.clone()
    }

    pub async fn snapshot(&self) -> AssignmentMap {
        self.map.read().await.clone()
    }

    pub async fn is_assigned(&self, unique_key: &str) -> bool {
        self.map.read().await.contains_key(unique_key)
    }
}
