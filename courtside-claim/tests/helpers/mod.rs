//! Stub league API for integration tests
//!
//! Serves the claim endpoints from in-memory data on an ephemeral port and
//! records every call so tests can assert on request counts and bodies.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use courtside_claim::{ClaimSession, HttpLeagueApi, SessionOptions};
use courtside_common::api::{
    AssignUnitRequest, CreatePlayerRequest, EntityId, ItemType, MigrationItem, MigrationRecord,
    Player, UnitAssignment,
};
use courtside_common::config::ClientConfig;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub const GUARDIAN_EMAIL: &str = "parent@example.com";
pub const TOKEN: &str = "test-token";

/// Server-side data and call log
#[derive(Debug, Default)]
pub struct StubData {
    pub migrations: Vec<MigrationRecord>,
    pub players: Vec<Player>,
    /// Record assignments on items so migrations report them back
    pub report_assignments: bool,
    /// Next assignment calls fail with this status and message
    pub fail_assign: Option<(u16, String)>,
    pub fail_skip: Option<(u16, String)>,
    pub assign_requests: Vec<AssignUnitRequest>,
    pub create_requests: Vec<CreatePlayerRequest>,
    pub skip_calls: usize,
    pub calls: HashMap<&'static str, usize>,
    pub request_ids: Vec<String>,
    pub unauthorized: usize,
}

#[derive(Clone)]
pub struct StubServer {
    pub data: Arc<Mutex<StubData>>,
    pub addr: SocketAddr,
}

impl StubServer {
    /// Start serving `data` on 127.0.0.1 with an OS-assigned port
    pub async fn start(data: StubData) -> Self {
        let data = Arc::new(Mutex::new(data));

        let app = Router::new()
            .route("/api/user/me", get(current_user))
            .route("/api/migrations", get(migrations))
            .route("/api/account/info", get(account_info))
            .route("/api/players/children", get(child_players))
            .route("/api/migrations/assign", post(assign))
            .route("/api/migrations/skip", post(skip))
            .route("/api/players", post(create_player))
            .with_state(Arc::clone(&data));

        let addr = serve(app).await;
        Self { data, addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        config_for(self.addr)
    }

    pub fn api(&self) -> Arc<HttpLeagueApi> {
        Arc::new(HttpLeagueApi::new(&self.config()).unwrap())
    }

    pub async fn session(&self) -> ClaimSession {
        let options = SessionOptions {
            dashboard_url: format!("{}/dashboard", self.base_url()),
            ..Default::default()
        };
        ClaimSession::load(self.api(), options).await.unwrap()
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.data.lock().unwrap().calls.get(endpoint).copied().unwrap_or(0)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut StubData) -> R) -> R {
        f(&mut self.data.lock().unwrap())
    }
}

/// Serve an arbitrary router on an ephemeral port
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        base_url: format!("http://{}", addr),
        api_token: Some(TOKEN.to_string()),
        dashboard_path: "/dashboard".to_string(),
        request_timeout: None,
        log_level: "debug".to_string(),
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn item(id: &str, quantity: u32) -> MigrationItem {
    MigrationItem {
        item_id: EntityId::new(id),
        item_type: ItemType::Program,
        item_name: format!("Program {}", id),
        quantity,
        assignments: None,
    }
}

pub fn record(id: &str, items: Vec<MigrationItem>) -> MigrationRecord {
    MigrationRecord {
        id: EntityId::new(id),
        email: GUARDIAN_EMAIL.to_string(),
        stripe_customer_id: Some("cus_1".to_string()),
        stripe_subscription_id: Some("sub_1".to_string()),
        stripe_subscription_ids: None,
        items,
    }
}

pub fn player(id: &str, first: &str, last: &str) -> Player {
    Player {
        id: EntityId::new(id),
        first_name: first.to_string(),
        last_name: last.to_string(),
    }
}

/// Migration `1` with item `A` of quantity 2, two players, assignments reported
pub fn two_unit_data() -> StubData {
    StubData {
        migrations: vec![record("1", vec![item("A", 2)])],
        players: vec![player("p1", "Sam", "Jordan"), player("p2", "Alex", "Jordan")],
        report_assignments: true,
        ..Default::default()
    }
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<Mutex<StubData>>>;

fn authorized(data: &mut StubData, headers: &HeaderMap, endpoint: &'static str) -> bool {
    *data.calls.entry(endpoint).or_insert(0) += 1;
    if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        data.request_ids.push(id.to_string());
    }
    let expected = format!("Bearer {}", TOKEN);
    let ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);
    if !ok {
        data.unauthorized += 1;
    }
    ok
}

fn failure(status: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "message": message }))).into_response()
}

fn unauthorized() -> Response {
    failure(401, "Not signed in")
}

async fn current_user(State(data): Shared, headers: HeaderMap) -> Response {
    let mut data = data.lock().unwrap();
    if !authorized(&mut data, &headers, "current-user") {
        return unauthorized();
    }
    Json(json!({ "id": 100, "email": GUARDIAN_EMAIL, "role": "parent" })).into_response()
}

async fn migrations(
    State(data): Shared,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut data = data.lock().unwrap();
    if !authorized(&mut data, &headers, "migrations") {
        return unauthorized();
    }
    let email = params.get("email").cloned().unwrap_or_default();
    let records: Vec<&MigrationRecord> =
        data.migrations.iter().filter(|r| r.email == email).collect();
    Json(json!(records)).into_response()
}

async fn account_info(State(data): Shared, headers: HeaderMap) -> Response {
    let mut data = data.lock().unwrap();
    if !authorized(&mut data, &headers, "account-info") {
        return unauthorized();
    }
    Json(json!({ "pendingMigration": data.skip_calls == 0 })).into_response()
}

async fn child_players(State(data): Shared, headers: HeaderMap) -> Response {
    let mut data = data.lock().unwrap();
    if !authorized(&mut data, &headers, "child-players") {
        return unauthorized();
    }
    Json(json!(data.players)).into_response()
}

async fn assign(
    State(data): Shared,
    headers: HeaderMap,
    Json(request): Json<AssignUnitRequest>,
) -> Response {
    let mut data = data.lock().unwrap();
    if !authorized(&mut data, &headers, "assign") {
        return unauthorized();
    }
    data.assign_requests.push(request.clone());

    if let Some((status, message)) = data.fail_assign.clone() {
        return failure(status, &message);
    }

    if data.report_assignments {
        let target = data
            .migrations
            .iter_mut()
            .filter(|r| r.id == request.migration_id)
            .flat_map(|r| r.items.iter_mut())
            .find(|i| i.item_id == request.item_id);

        match target {
            Some(item) => item.assignments.get_or_insert_with(Vec::new).push(UnitAssignment {
                instance_index: request.instance_index,
                player_id: request.player_id.clone(),
            }),
            None => return failure(404, "Purchase not found"),
        }
    }

    Json(json!({ "message": "Purchase assigned" })).into_response()
}

async fn skip(State(data): Shared, headers: HeaderMap) -> Response {
    let mut data = data.lock().unwrap();
    if !authorized(&mut data, &headers, "skip") {
        return unauthorized();
    }
    if let Some((status, message)) = data.fail_skip.clone() {
        return failure(status, &message);
    }
    data.skip_calls += 1;
    Json(json!({})).into_response()
}

async fn create_player(
    State(data): Shared,
    headers: HeaderMap,
    Json(request): Json<CreatePlayerRequest>,
) -> Response {
    let mut data = data.lock().unwrap();
    if !authorized(&mut data, &headers, "create-player") {
        return unauthorized();
    }
    data.create_requests.push(request.clone());

    let created = player(
        &format!("p{}", data.players.len() + 1),
        &request.first_name,
        &request.last_name,
    );
    data.players.push(created.clone());
    (StatusCode::CREATED, Json(json!(created))).into_response()
}
