//! Assignment submitter
//!
//! The assignment dialog is a small state machine:
//!
//! ```text
//! Idle -> Selecting -> Submitting -> Succeeded
//!             ^            |
//!             +--- failed -+   (error kept in `last_error`)
//! ```
//!
//! Transitions are pure. [`AssignmentSubmitter`] performs the request and
//! applies the outcome: on success caches are invalidated and the unit is
//! recorded as assigned; on failure the assignment map is left untouched.

use chrono::Utc;
use courtside_common::api::{AssignUnitRequest, EntityId};
use courtside_common::events::{ClaimEvent, EventBus};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::client::LeagueApi;
use crate::error::{ClaimError, ClaimResult};
use crate::flatten::FlattenedUnit;
use crate::pending::{assign_key, PendingMutations};
use crate::tracker::{AssignmentEvent, AssignmentMap, AssignmentStore};

/// Queries made stale by a successful assignment
pub const INVALIDATED_BY_ASSIGNMENT: [QueryKey; 3] = [
    QueryKey::Migrations,
    QueryKey::AccountInfo,
    QueryKey::ChildPlayers,
];

/// Illegal move of the assignment dialog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("unit {0} is already assigned")]
    UnitAlreadyAssigned(String),

    #[error("no player selected")]
    NoPlayerSelected,

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}

/// Assignment dialog state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmitterState {
    /// Dialog closed
    #[default]
    Idle,
    /// Unit chosen, waiting for a player; `last_error` set after a failure
    Selecting {
        unit: FlattenedUnit,
        player_id: Option<EntityId>,
        last_error: Option<String>,
    },
    /// Request in flight
    Submitting {
        unit: FlattenedUnit,
        player_id: EntityId,
    },
    /// Server acknowledged; dialog closed
    Succeeded {
        unit: FlattenedUnit,
        player_id: EntityId,
    },
}

impl SubmitterState {
    pub fn name(&self) -> &'static str {
        match self {
            SubmitterState::Idle => "idle",
            SubmitterState::Selecting { .. } => "selecting",
            SubmitterState::Submitting { .. } => "submitting",
            SubmitterState::Succeeded { .. } => "succeeded",
        }
    }

    pub fn unit(&self) -> Option<&FlattenedUnit> {
        match self {
            SubmitterState::Idle => None,
            SubmitterState::Selecting { unit, .. }
            | SubmitterState::Submitting { unit, .. }
            | SubmitterState::Succeeded { unit, .. } => Some(unit),
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            SubmitterState::Selecting { last_error, .. } => last_error.as_deref(),
            _ => None,
        }
    }

    /// Submit is enabled only with a unit and a player chosen
    pub fn can_submit(&self) -> bool {
        matches!(
            self,
            SubmitterState::Selecting {
                player_id: Some(_),
                ..
            }
        )
    }

    /// Choose a unit to assign; it must not already be assigned
    pub fn open(&self, unit: FlattenedUnit, assignments: &AssignmentMap) -> Result<Self, TransitionError> {
        if matches!(self, SubmitterState::Submitting { .. }) {
            return Err(self.invalid("open a unit"));
        }
        if assignments.contains_key(&unit.unique_key) {
            return Err(TransitionError::UnitAlreadyAssigned(unit.unique_key));
        }
        Ok(SubmitterState::Selecting {
            unit,
            player_id: None,
            last_error: None,
        })
    }

    pub fn select_player(&self, player_id: EntityId) -> Result<Self, TransitionError> {
        match self {
            SubmitterState::Selecting { unit, .. } => Ok(SubmitterState::Selecting {
                unit: unit.clone(),
                player_id: Some(player_id),
                last_error: None,
            }),
            _ => Err(self.invalid("select a player")),
        }
    }

    pub fn submit(&self) -> Result<Self, TransitionError> {
        match self {
            SubmitterState::Selecting {
                unit,
                player_id: Some(player_id),
                ..
            } => Ok(SubmitterState::Submitting {
                unit: unit.clone(),
                player_id: player_id.clone(),
            }),
            SubmitterState::Selecting { player_id: None, .. } => {
                Err(TransitionError::NoPlayerSelected)
            }
            _ => Err(self.invalid("submit")),
        }
    }

    pub fn succeed(&self) -> Result<Self, TransitionError> {
        match self {
            SubmitterState::Submitting { unit, player_id } => Ok(SubmitterState::Succeeded {
                unit: unit.clone(),
                player_id: player_id.clone(),
            }),
            _ => Err(self.invalid("complete")),
        }
    }

    /// Back to selecting with the same player and the failure message
    pub fn fail(&self, message: impl Into<String>) -> Result<Self, TransitionError> {
        match self {
            SubmitterState::Submitting { unit, player_id } => Ok(SubmitterState::Selecting {
                unit: unit.clone(),
                player_id: Some(player_id.clone()),
                last_error: Some(message.into()),
            }),
            _ => Err(self.invalid("fail")),
        }
    }

    /// Close the dialog; not possible while a request is in flight
    pub fn close(&self) -> Result<Self, TransitionError> {
        match self {
            SubmitterState::Submitting { .. } => Err(self.invalid("close")),
            _ => Ok(SubmitterState::Idle),
        }
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError::InvalidState {
            action,
            state: self.name(),
        }
    }
}

/// Performs assignment requests and applies their outcome
pub struct AssignmentSubmitter {
    api: Arc<dyn LeagueApi>,
    cache: Arc<QueryCache>,
    events: EventBus,
    pending: Arc<PendingMutations>,
}

impl AssignmentSubmitter {
    pub fn new(
        api: Arc<dyn LeagueApi>,
        cache: Arc<QueryCache>,
        events: EventBus,
        pending: Arc<PendingMutations>,
    ) -> Self {
        Self {
            api,
            cache,
            events,
            pending,
        }
    }

    /// Submit the dialog in `state`
    ///
    /// Returns `Succeeded`, or `Selecting` with `last_error` when the server
    /// rejected the request or could not be reached. Local problems (no
    /// player, unit already assigned, same unit already in flight) are
    /// returned as errors without contacting the server.
    pub async fn submit(
        &self,
        state: &SubmitterState,
        store: &AssignmentStore,
    ) -> ClaimResult<SubmitterState> {
        let submitting = state.submit()?;
        let SubmitterState::Submitting { unit, player_id } = &submitting else {
            return Err(state.invalid("submit").into());
        };

        let _guard = self.pending.begin(assign_key(&unit.unique_key))?;

        // another submission may have completed since the dialog opened
        if store.is_assigned(&unit.unique_key).await {
            return Err(TransitionError::UnitAlreadyAssigned(unit.unique_key.clone()).into());
        }

        let request = AssignUnitRequest {
            migration_id: unit.migration_id.clone(),
            subscription_id: unit.subscription_id.clone(),
            item_id: unit.item_id.clone(),
            item_type: unit.item_type,
            instance_index: unit.instance_index,
            player_id: player_id.clone(),
        };

        match self.api.assign_unit(&request).await {
            Ok(ack) => {
                self.cache.invalidate(&INVALIDATED_BY_ASSIGNMENT);
                self.events.emit_lossy(ClaimEvent::QueriesInvalidated {
                    queries: INVALIDATED_BY_ASSIGNMENT
                        .iter()
                        .map(|k| k.as_str().to_string())
                        .collect(),
                    timestamp: Utc::now(),
                });

                store
                    .dispatch(&AssignmentEvent::Assigned {
                        unique_key: unit.unique_key.clone(),
                        player_id: player_id.clone(),
                    })
                    .await;

                info!(unit = %unit.unique_key, player = %player_id, "Unit assigned");
                self.events.emit_lossy(ClaimEvent::UnitAssigned {
                    unique_key: unit.unique_key.clone(),
                    player_id: player_id.clone(),
                    message: ack.message,
                    timestamp: Utc::now(),
                });

                Ok(submitting.succeed()?)
            }
            Err(e) if e.is_request_failure() => {
                let message = e.user_message();
                warn!(unit = %unit.unique_key, error = %e, "Assignment failed");
                self.events.emit_lossy(ClaimEvent::AssignmentFailed {
                    unique_key: unit.unique_key.clone(),
                    message: message.clone(),
                    timestamp: Utc::now(),
                });
                Ok(submitting.fail(message)?)
            }
            Err(e) => Err(e),
        }
    }
}
