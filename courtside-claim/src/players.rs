//! Player creation sub-flow
//!
//! Names are validated client-side; an invalid form never reaches the
//! server. Nothing local changes before the server confirms, so a failed
//! request needs no rollback and the form can simply be retried.

use chrono::Utc;
use courtside_common::api::{CreatePlayerRequest, Player};
use courtside_common::events::{ClaimEvent, EventBus};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::client::LeagueApi;
use crate::error::{ClaimError, ClaimResult};
use crate::pending::{PendingMutations, CREATE_PLAYER};

/// New player dialog contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPlayerForm {
    pub first_name: String,
    pub last_name: String,
}

impl NewPlayerForm {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Submit is enabled only when both names are non-blank
    pub fn can_submit(&self) -> bool {
        self.validate().is_ok()
    }

    /// Trimmed request, or the first missing field
    pub fn validate(&self) -> ClaimResult<CreatePlayerRequest> {
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();

        if first_name.is_empty() {
            return Err(ClaimError::Validation("first name is required".to_string()));
        }
        if last_name.is_empty() {
            return Err(ClaimError::Validation("last name is required".to_string()));
        }

        Ok(CreatePlayerRequest {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }
}

/// Creates players and refreshes the roster query
pub struct PlayerCreator {
    api: Arc<dyn LeagueApi>,
    cache: Arc<QueryCache>,
    events: EventBus,
    pending: Arc<PendingMutations>,
}

impl PlayerCreator {
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

    /// Validate and create; on success the roster query is invalidated
    pub async fn create(&self, form: &NewPlayerForm) -> ClaimResult<Player> {
        let request = form.validate()?;
        let _guard = self.pending.begin(CREATE_PLAYER)?;

        match self.api.create_player(&request).await {
            Ok(player) => {
                self.cache.invalidate(&[QueryKey::ChildPlayers]);
                info!(player = %player.id, "Player created");
                self.events.emit_lossy(ClaimEvent::PlayerCreated {
                    player_id: player.id.clone(),
                    display_name: player.display_name(),
                    timestamp: Utc::now(),
                });
                Ok(player)
            }
            Err(e) => {
                warn!(error = %e, "Player creation failed");
                self.events.emit_lossy(ClaimEvent::PlayerCreationFailed {
                    message: e.user_message(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }
}
