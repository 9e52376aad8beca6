//! Claim session orchestration
//!
//! Loads the guardian, their migration records and roster; flattens the
//! records; seeds the assignment map from server-reported truth; then
//! drives assignments, player creation and the terminal skip/complete
//! paths. After every successful assignment the migrations are re-fetched
//! and server truth is merged back into the map.

use chrono::Utc;
use courtside_common::api::{AccountInfo, CurrentUser, EntityId, MigrationRecord, Player};
use courtside_common::events::{ClaimEvent, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::client::LeagueApi;
use crate::error::{ClaimError, ClaimResult};
use crate::flatten::{flatten, FlattenedUnit, RoundRobinByPosition, SubscriptionStrategy};
use crate::pending::{PendingMutations, SKIP};
use crate::players::{NewPlayerForm, PlayerCreator};
use crate::submitter::{AssignmentSubmitter, SubmitterState};
use crate::tracker::{
    diff_count, partition, server_assignments, AssignmentEvent, AssignmentMap, AssignmentStore,
    Partition,
};

/// Session construction options
pub struct SessionOptions {
    pub strategy: Arc<dyn SubscriptionStrategy>,
    /// Where terminal transitions send the guardian
    pub dashboard_url: String,
    pub events: EventBus,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            strategy: Arc::new(RoundRobinByPosition),
            dashboard_url: "/dashboard".to_string(),
            events: EventBus::new(100),
        }
    }
}

/// Terminal navigation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
}

/// Whether the workflow can end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    InProgress { remaining: usize },
    AllAssigned(Redirect),
}

/// One guardian's claim workflow
pub struct ClaimSession {
    api: Arc<dyn LeagueApi>,
    cache: Arc<QueryCache>,
    events: EventBus,
    strategy: Arc<dyn SubscriptionStrategy>,
    pending: Arc<PendingMutations>,
    store: AssignmentStore,
    units: RwLock<Vec<FlattenedUnit>>,
    refresh_lock: Mutex<()>,
    user: CurrentUser,
    submitter: AssignmentSubmitter,
    players: PlayerCreator,
    dashboard_url: String,
    completion_announced: AtomicBool,
}

impl ClaimSession {
    /// Identify the guardian and load their records and roster
    pub async fn load(api: Arc<dyn LeagueApi>, options: SessionOptions) -> ClaimResult<Self> {
        let cache = Arc::new(QueryCache::new());
        let user = cache
            .current_user
            .get_or_fetch(|| api.current_user())
            .await?;
        info!(user = %user.id, email = %user.email, "Loaded guardian");

        let pending = PendingMutations::new();
        let submitter = AssignmentSubmitter::new(
            Arc::clone(&api),
            Arc::clone(&cache),
            options.events.clone(),
            Arc::clone(&pending),
        );
        let players = PlayerCreator::new(
            Arc::clone(&api),
            Arc::clone(&cache),
            options.events.clone(),
            Arc::clone(&pending),
        );

        let session = Self {
            api,
            cache,
            events: options.events,
            strategy: options.strategy,
            pending,
            store: AssignmentStore::new(),
            units: RwLock::new(Vec::new()),
            refresh_lock: Mutex::new(()),
            user,
            submitter,
            players,
            dashboard_url: options.dashboard_url,
            completion_announced: AtomicBool::new(false),
        };

        session.refresh().await?;
        let roster = session.roster().await?;

        let view = session.view().await;
        info!(
            units = view.total(),
            unassigned = view.unassigned.len(),
            players = roster.len(),
            strategy = session.strategy.name(),
            "Claim session ready"
        );

        Ok(session)
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn dashboard_url(&self) -> &str {
        &self.dashboard_url
    }

    pub fn is_pending(&self, mutation_key: &str) -> bool {
        self.pending.is_pending(mutation_key)
    }

    /// Migration records for the guardian's email (cached)
    pub async fn migrations(&self) -> ClaimResult<Vec<MigrationRecord>> {
        let email = self.user.email.as_str();
        self.cache
            .migrations
            .get_or_fetch(|| self.api.migrations(email))
            .await
    }

    /// Guardian's players (cached; refreshed after player creation)
    pub async fn roster(&self) -> ClaimResult<Vec<Player>> {
        self.cache
            .child_players
            .get_or_fetch(|| self.api.child_players())
            .await
    }

    pub async fn account_info(&self) -> ClaimResult<AccountInfo> {
        self.cache
            .account_info
            .get_or_fetch(|| self.api.account_info())
            .await
    }

    /// Re-read migrations and merge server truth into the assignment map
    ///
    /// Returns the number of units whose binding changed.
    pub async fn refresh(&self) -> ClaimResult<usize> {
        let _serialized = self.refresh_lock.lock().await;

        let records = self.migrations().await?;
        let units = flatten(&records, self.strategy.as_ref())?;
        let server = server_assignments(&records, &units);

        let before = self.store.snapshot().await;
        let after = self
            .store
            .dispatch(&AssignmentEvent::Reconciled { server })
            .await;
        *self.units.write().await = units;

        let changed = diff_count(&before, &after);
        if changed > 0 {
            info!(changed, assigned = after.len(), "Reconciled assignments with server");
            self.events.emit_lossy(ClaimEvent::AssignmentsReconciled {
                assigned_units: after.len(),
                changed_units: changed,
                timestamp: Utc::now(),
            });
        }
        Ok(changed)
    }

    /// Current partition of units into unassigned and assigned
    pub async fn view(&self) -> Partition {
        let units = self.units.read().await;
        let map = self.store.snapshot().await;
        partition(&units, &map)
    }

    pub async fn assignments(&self) -> AssignmentMap {
        self.store.snapshot().await
    }

    pub async fn completion(&self) -> Completion {
        let view = self.view().await;
        if view.is_complete() {
            Completion::AllAssigned(self.redirect())
        } else {
            Completion::InProgress {
                remaining: view.unassigned.len(),
            }
        }
    }

    /// Open the assignment dialog for an unassigned unit
    pub async fn open_assignment(&self, unique_key: &str) -> ClaimResult<SubmitterState> {
        let unit = self
            .units
            .read()
            .await
            .iter()
            .find(|u| u.unique_key == unique_key)
            .cloned()
            .ok_or_else(|| ClaimError::UnknownUnit(unique_key.to_string()))?;

        let map = self.store.snapshot().await;
        Ok(SubmitterState::Idle.open(unit, &map)?)
    }

    /// Submit an assignment dialog
    ///
    /// On success the local map is updated, then migrations are re-fetched
    /// and reconciled. A failed re-fetch keeps the acknowledged local state.
    pub async fn submit(&self, state: &SubmitterState) -> ClaimResult<SubmitterState> {
        let outcome = self.submitter.submit(state, &self.store).await?;

        if let SubmitterState::Succeeded { .. } = outcome {
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "Could not re-read migrations after assignment");
            }
            self.announce_if_complete().await;
        }

        Ok(outcome)
    }

    /// Assign `unique_key` to a player on the guardian's roster
    pub async fn assign(&self, unique_key: &str, player_id: EntityId) -> ClaimResult<SubmitterState> {
        let roster = self.roster().await?;
        if !roster.iter().any(|p| p.id == player_id) {
            return Err(ClaimError::UnknownPlayer(player_id));
        }

        let state = self.open_assignment(unique_key).await?.select_player(player_id)?;
        self.submit(&state).await
    }

    /// Create a player; they are selectable on the next roster read
    pub async fn create_player(&self, form: &NewPlayerForm) -> ClaimResult<Player> {
        self.players.create(form).await
    }

    /// Defer assignment; redirects regardless of remaining units
    pub async fn skip(&self) -> ClaimResult<Redirect> {
        let _guard = self.pending.begin(SKIP)?;

        match self.api.skip_assignment().await {
            Ok(()) => {
                self.cache.invalidate(&[QueryKey::AccountInfo]);
                let redirect = self.redirect();
                info!(redirect = %redirect.to, "Assignment skipped");
                self.events.emit_lossy(ClaimEvent::AssignmentSkipped {
                    redirect_to: redirect.to.clone(),
                    timestamp: Utc::now(),
                });
                Ok(redirect)
            }
            Err(e) => {
                warn!(error = %e, "Skip failed");
                self.events.emit_lossy(ClaimEvent::SkipFailed {
                    message: e.user_message(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    fn redirect(&self) -> Redirect {
        Redirect {
            to: self.dashboard_url.clone(),
        }
    }

    async fn announce_if_complete(&self) {
        let view = self.view().await;
        if !view.is_complete() {
            return;
        }
        if self.completion_announced.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(units = view.total(), "All units assigned");
        self.events.emit_lossy(ClaimEvent::AllUnitsAssigned {
            total_units: view.total(),
            redirect_to: self.dashboard_url.clone(),
            timestamp: Utc::now(),
        });
    }
}
