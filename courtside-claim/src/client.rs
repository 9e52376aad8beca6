//! League API client
//!
//! [`LeagueApi`] is the seam between the claim workflow and the server.
//! [`HttpLeagueApi`] talks JSON over HTTP with reqwest; every response body
//! is decoded and validated at this boundary.

use async_trait::async_trait;
use courtside_common::api::{
    decode_payload, AccountInfo, AssignUnitRequest, CreatePlayerRequest, CurrentUser,
    MessageResponse, MigrationRecord, Player, SkipRequest, Validate,
};
use courtside_common::config::{join_url, ClientConfig};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ClaimError, ClaimResult};

const USER_AGENT: &str = concat!("Courtside/", env!("CARGO_PKG_VERSION"));

/// Request correlation header sent with every mutation
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Endpoint paths relative to the configured base URL
pub mod endpoints {
    pub const CURRENT_USER: &str = "/api/user/me";
    pub const MIGRATIONS: &str = "/api/migrations";
    pub const ACCOUNT_INFO: &str = "/api/account/info";
    pub const CHILD_PLAYERS: &str = "/api/players/children";
    pub const ASSIGN_UNIT: &str = "/api/migrations/assign";
    pub const SKIP_ASSIGNMENT: &str = "/api/migrations/skip";
    pub const CREATE_PLAYER: &str = "/api/players";
}

/// League API used by the claim workflow
#[async_trait]
pub trait LeagueApi: Send + Sync {
    /// Identify the guardian
    async fn current_user(&self) -> ClaimResult<CurrentUser>;

    /// Legacy subscriptions purchased under `email`
    async fn migrations(&self, email: &str) -> ClaimResult<Vec<MigrationRecord>>;

    async fn account_info(&self) -> ClaimResult<AccountInfo>;

    /// Guardian's player roster
    async fn child_players(&self) -> ClaimResult<Vec<Player>>;

    /// Bind one unit to one player; returns the server's acknowledgement
    async fn assign_unit(&self, request: &AssignUnitRequest) -> ClaimResult<MessageResponse>;

    /// Defer assignment and mark the account accordingly
    async fn skip_assignment(&self) -> ClaimResult<()>;

    async fn create_player(&self, request: &CreatePlayerRequest) -> ClaimResult<Player>;
}

/// reqwest implementation of [`LeagueApi`]
pub struct HttpLeagueApi {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpLeagueApi {
    /// Build a client from resolved configuration
    ///
    /// No timeout is applied unless the configuration sets one.
    pub fn new(config: &ClientConfig) -> ClaimResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| ClaimError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> ClaimResult<T>
    where
        T: DeserializeOwned + Validate,
    {
        let url = join_url(&self.base_url, path);
        debug!(url = %url, "GET");

        let request = self.authorize(self.http_client.get(&url).query(query));
        let response = request
            .send()
            .await
            .map_err(|e| ClaimError::Network(e.to_string()))?;

        read_response(path, response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> ClaimResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Validate,
    {
        let url = join_url(&self.base_url, path);
        let request_id = Uuid::new_v4();
        debug!(url = %url, request_id = %request_id, "POST");

        let request = self.authorize(
            self.http_client
                .post(&url)
                .header(REQUEST_ID_HEADER, request_id.to_string())
                .json(body),
        );
        let response = request.send().await.map_err(|e| {
            warn!(request_id = %request_id, error = %e, "Request did not complete");
            ClaimError::Network(e.to_string())
        })?;

        read_response(path, response).await
    }
}

/// Turn an HTTP response into a decoded payload or a request error
async fn read_response<T>(endpoint: &str, response: Response) -> ClaimResult<T>
where
    T: DeserializeOwned + Validate,
{
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ClaimError::Network(e.to_string()))?;

    if !status.is_success() {
        let message = failure_message(status, &body);
        warn!(endpoint, status = status.as_u16(), message = %message, "Request failed");
        return Err(ClaimError::Request {
            status: status.as_u16(),
            message,
        });
    }

    // Empty success bodies are treated as `{}`
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &body
    };

    Ok(decode_payload(endpoint, body)?)
}

/// Server-provided `message`, or a generic text naming the status
fn failure_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<MessageResponse>(body)
        .ok()
        .map(|m| m.message.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            format!(
                "Request failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status")
            )
        })
}

#[async_trait]
impl LeagueApi for HttpLeagueApi {
    async fn current_user(&self) -> ClaimResult<CurrentUser> {
        self.get(endpoints::CURRENT_USER, &[]).await
    }

    async fn migrations(&self, email: &str) -> ClaimResult<Vec<MigrationRecord>> {
        let records: Vec<MigrationRecord> =
            self.get(endpoints::MIGRATIONS, &[("email", email)]).await?;
        info!(records = records.len(), "Loaded migration records");
        Ok(records)
    }

    async fn account_info(&self) -> ClaimResult<AccountInfo> {
        self.get(endpoints::ACCOUNT_INFO, &[]).await
    }

    async fn child_players(&self) -> ClaimResult<Vec<Player>> {
        self.get(endpoints::CHILD_PLAYERS, &[]).await
    }

    async fn assign_unit(&self, request: &AssignUnitRequest) -> ClaimResult<MessageResponse> {
        self.post(endpoints::ASSIGN_UNIT, request).await
    }

    async fn skip_assignment(&self) -> ClaimResult<()> {
        let _: MessageResponse = self
            .post(endpoints::SKIP_ASSIGNMENT, &SkipRequest::default())
            .await?;
        Ok(())
    }

    async fn create_player(&self, request: &CreatePlayerRequest) -> ClaimResult<Player> {
        self.post(endpoints::CREATE_PLAYER, request).await
    }
}
