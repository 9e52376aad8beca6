//! Event types for the claim workflow
//!
//! Provides the shared event definitions and EventBus. Front ends subscribe
//! to render transient notifications; no component depends on delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::api::EntityId;

/// Claim workflow events
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaimEvent {
    /// Server acknowledged an assignment; the unit is now assigned locally
    UnitAssigned {
        unique_key: String,
        player_id: EntityId,
        /// Server's acknowledgement text
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Assignment request failed; the unit remains unassigned and retryable
    AssignmentFailed {
        unique_key: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A new player was added to the roster
    PlayerCreated {
        player_id: EntityId,
        display_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Player creation failed; the form is kept for retry
    PlayerCreationFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Guardian deferred assignment; terminal
    AssignmentSkipped {
        redirect_to: String,
        timestamp: DateTime<Utc>,
    },

    /// Skip request failed; the guardian stays in the workflow
    SkipFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// No unassigned units remain; terminal redirect offered
    AllUnitsAssigned {
        total_units: usize,
        redirect_to: String,
        timestamp: DateTime<Utc>,
    },

    /// Cached queries were marked stale after a mutation
    QueriesInvalidated {
        queries: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Local assignments were replaced by server-reported truth
    AssignmentsReconciled {
        assigned_units: usize,
        changed_units: usize,
        timestamp: DateTime<Utc>,
    },
}

impl ClaimEvent {
    /// Human-readable notification text, for events users should see
    pub fn notification(&self) -> Option<String> {
        match self {
            ClaimEvent::UnitAssigned { message, unique_key, .. } => Some(if message.is_empty() {
                format!("Assigned {}", unique_key)
            } else {
                message.clone()
            }),
            ClaimEvent::AssignmentFailed { message, .. } => Some(message.clone()),
            ClaimEvent::PlayerCreated { display_name, .. } => {
                Some(format!("Added player {}", display_name))
            }
            ClaimEvent::PlayerCreationFailed { message, .. } => Some(message.clone()),
            ClaimEvent::AssignmentSkipped { redirect_to, .. } => {
                Some(format!("Assignment deferred. Continue at {}", redirect_to))
            }
            ClaimEvent::SkipFailed { message, .. } => Some(message.clone()),
            ClaimEvent::AllUnitsAssigned { redirect_to, .. } => {
                Some(format!("All purchases assigned. Continue at {}", redirect_to))
            }
            ClaimEvent::QueriesInvalidated { .. } | ClaimEvent::AssignmentsReconciled { .. } => {
                None
            }
        }
    }

    /// True for failure events
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ClaimEvent::AssignmentFailed { .. }
                | ClaimEvent::PlayerCreationFailed { .. }
                | ClaimEvent::SkipFailed { .. }
        )
    }
}

/// Broadcast bus for [`ClaimEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClaimEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use courtside_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ClaimEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    pub fn emit(
        &self,
        event: ClaimEvent,
    ) -> Result<usize, broadcast::error::SendError<ClaimEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ClaimEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
