//! Remote validator: the community backend's account, staff and division
//! endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use shared::types::{
    AccountPayload, ApiConfig, BanRecord, DivisionRole, ErrorResponse, SessionToken, StaffRole,
};
use tracing::{debug, warn};

use crate::error::BackendError;

pub const ACCOUNT_PATH: &str = "/auth/account";
pub const STAFF_PATH: &str = "/auth/is-staff";
pub const DIVISIONS_PATH: &str = "/divisions/user";

/// Header the account and division endpoints read the token from.
pub const TOKEN_HEADER: &str = "X-Vatsim-Token";

/// Authoritative answer of the account endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountOutcome {
    Active(AccountPayload),
    Banned(BanRecord),
}

/// The backend calls a session resolution depends on.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn fetch_account(&self, token: &SessionToken) -> Result<AccountOutcome, BackendError>;

    async fn fetch_staff_role(&self, token: &SessionToken) -> Result<StaffRole, BackendError>;

    async fn fetch_division_roles(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<DivisionRole>, BackendError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

enum Credential<'a> {
    /// `X-Vatsim-Token: <token>`
    TokenHeader(&'a SessionToken),
    /// `Authorization: Bearer <token>`
    Bearer(&'a SessionToken),
}

/// `AccountApi` over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
        user_agent: &str,
    ) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self, BackendError> {
        Self::new(
            api.resolved_base_url(),
            api.request_timeout(),
            &api.user_agent,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue a GET and return the status and raw body.
    async fn get(
        &self,
        path: &str,
        credential: Credential<'_>,
    ) -> Result<(StatusCode, Vec<u8>), BackendError> {
        let request = self.client.get(self.url(path));
        let request = match credential {
            Credential::TokenHeader(token) => request.header(TOKEN_HEADER, token.as_str()),
            Credential::Bearer(token) => request.bearer_auth(token.as_str()),
        };

        debug!("GET {}", path);

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(path, e))?;

        debug!("GET {} -> {} ({} bytes)", path, status.as_u16(), body.len());
        Ok((status, body.to_vec()))
    }

    /// GET a JSON document, treating any non-2xx status as an error.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: Credential<'_>,
    ) -> Result<T, BackendError> {
        let (status, body) = self.get(path, credential).await?;
        if !status.is_success() {
            return Err(status_error(path, status, &body));
        }
        decode(path, &body)
    }
}

#[async_trait]
impl AccountApi for HttpBackend {
    async fn fetch_account(&self, token: &SessionToken) -> Result<AccountOutcome, BackendError> {
        let (status, body) = self
            .get(ACCOUNT_PATH, Credential::TokenHeader(token))
            .await?;

        if status == StatusCode::FORBIDDEN {
            // A 403 is only a ban when it says so; anything else is a failure.
            return match serde_json::from_slice::<AccountPayload>(&body)
                .ok()
                .and_then(|payload| payload.ban_record())
            {
                Some(record) => {
                    debug!("Account endpoint reported a ban: {}", record);
                    Ok(AccountOutcome::Banned(record))
                }
                None => Err(status_error(ACCOUNT_PATH, status, &body)),
            };
        }

        if !status.is_success() {
            return Err(status_error(ACCOUNT_PATH, status, &body));
        }

        let payload: AccountPayload = decode(ACCOUNT_PATH, &body)?;
        Ok(match payload.ban_record() {
            Some(record) => AccountOutcome::Banned(record),
            None => AccountOutcome::Active(payload),
        })
    }

    async fn fetch_staff_role(&self, token: &SessionToken) -> Result<StaffRole, BackendError> {
        self.get_json(STAFF_PATH, Credential::Bearer(token)).await
    }

    async fn fetch_division_roles(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<DivisionRole>, BackendError> {
        self.get_json(DIVISIONS_PATH, Credential::TokenHeader(token))
            .await
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, BackendError> {
    serde_json::from_slice(body).map_err(|e| BackendError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

fn status_error(endpoint: &str, status: StatusCode, body: &[u8]) -> BackendError {
    let message = ErrorResponse::describe(body);
    warn!("{} returned HTTP {}: {}", endpoint, status.as_u16(), message);
    BackendError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message,
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        BackendError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}
