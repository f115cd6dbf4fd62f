#![allow(dead_code)]

pub mod mock_backend;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use session::{
    AccountApi, AccountOutcome, BackendError, CacheStore, ManualClock, MemoryCacheStore,
    MemoryTokenStore, Navigator, SessionCache, SessionService, SessionStore, TokenStore,
};
use shared::types::{
    AccountPayload, DEFAULT_CACHE_TTL, DivisionRole, SessionState, SessionToken, StaffRole,
};
use tokio::sync::Semaphore;

pub const TOKEN: &str = "tok-abc123";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn token() -> SessionToken {
    SessionToken::new(TOKEN).unwrap()
}

pub fn active(json: Value) -> AccountOutcome {
    AccountOutcome::Active(serde_json::from_value::<AccountPayload>(json).unwrap())
}

pub fn staff(role: Option<&str>) -> StaffRole {
    StaffRole {
        role: role.map(str::to_string),
    }
}

pub fn divisions(roles: &[&str]) -> Vec<DivisionRole> {
    roles
        .iter()
        .map(|role| DivisionRole {
            role: role.to_string(),
        })
        .collect()
}

pub fn server_error(endpoint: &str) -> BackendError {
    BackendError::Status {
        endpoint: endpoint.to_string(),
        status: 500,
        message: "boom".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// `AccountApi` that answers from preset results and counts calls.
///
/// With a gate installed, `fetch_account` parks until the test releases a
/// permit, which makes overlapping resolutions deterministic.
pub struct ScriptedApi {
    account: Mutex<Result<AccountOutcome, BackendError>>,
    staff: Mutex<Result<StaffRole, BackendError>>,
    divisions: Mutex<Result<Vec<DivisionRole>, BackendError>>,
    account_calls: AtomicUsize,
    staff_calls: AtomicUsize,
    division_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedApi {
    pub fn new(account: AccountOutcome) -> Self {
        Self {
            account: Mutex::new(Ok(account)),
            staff: Mutex::new(Ok(StaffRole::default())),
            divisions: Mutex::new(Ok(Vec::new())),
            account_calls: AtomicUsize::new(0),
            staff_calls: AtomicUsize::new(0),
            division_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    pub fn with_roles(self, staff: StaffRole, divisions: Vec<DivisionRole>) -> Self {
        *self.staff.lock().unwrap() = Ok(staff);
        *self.divisions.lock().unwrap() = Ok(divisions);
        self
    }

    pub fn set_account(&self, result: Result<AccountOutcome, BackendError>) {
        *self.account.lock().unwrap() = result;
    }

    pub fn set_staff(&self, result: Result<StaffRole, BackendError>) {
        *self.staff.lock().unwrap() = result;
    }

    pub fn set_divisions(&self, result: Result<Vec<DivisionRole>, BackendError>) {
        *self.divisions.lock().unwrap() = result;
    }

    /// Park every `fetch_account` until the test adds a permit to the gate.
    pub fn close_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub fn staff_calls(&self) -> usize {
        self.staff_calls.load(Ordering::SeqCst)
    }

    pub fn division_calls(&self) -> usize {
        self.division_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountApi for ScriptedApi {
    async fn fetch_account(&self, token: &SessionToken) -> Result<AccountOutcome, BackendError> {
        assert_eq!(token.as_str(), TOKEN);
        self.account_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        self.account.lock().unwrap().clone()
    }

    async fn fetch_staff_role(&self, _token: &SessionToken) -> Result<StaffRole, BackendError> {
        self.staff_calls.fetch_add(1, Ordering::SeqCst);
        self.staff.lock().unwrap().clone()
    }

    async fn fetch_division_roles(
        &self,
        _token: &SessionToken,
    ) -> Result<Vec<DivisionRole>, BackendError> {
        self.division_calls.fetch_add(1, Ordering::SeqCst);
        self.divisions.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, destination: &str) {
        self.redirects.lock().unwrap().push(destination.to_string());
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub api: Arc<ScriptedApi>,
    pub tokens: Arc<MemoryTokenStore>,
    pub cache: Arc<MemoryCacheStore>,
    pub clock: Arc<ManualClock>,
    pub navigator: Arc<RecordingNavigator>,
    pub service: SessionService,
}

impl Fixture {
    /// Service with a stored token and empty caches.
    pub fn new(api: ScriptedApi) -> Self {
        Self::with_state(api, SessionState::initial())
    }

    pub fn with_state(api: ScriptedApi, state: SessionState) -> Self {
        let api = Arc::new(api);
        let tokens = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let cache = Arc::new(MemoryCacheStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let navigator = Arc::new(RecordingNavigator::default());

        let service = SessionService::builder(api.clone())
            .token_store(tokens.clone())
            .cache_store(cache.clone())
            .clock(clock.clone())
            .navigator(navigator.clone())
            .home_path("/home")
            .state_store(SessionStore::with_state(state))
            .build();

        Self {
            api,
            tokens,
            cache,
            clock,
            navigator,
            service,
        }
    }

    /// Direct access to the cache entries the service reads.
    pub fn cache_view(&self) -> SessionCache {
        SessionCache::new(self.cache.clone(), DEFAULT_CACHE_TTL)
    }

    pub fn cached_json(&self, key: &str) -> Option<Value> {
        self.cache
            .get(key)
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    pub fn has_token(&self) -> bool {
        self.tokens.get_token().is_some()
    }

    /// Yield until `fetch_account` has been entered `calls` times.
    pub async fn wait_for_account_calls(&self, calls: usize) {
        while self.api.account_calls() < calls {
            tokio::task::yield_now().await;
        }
    }
}
