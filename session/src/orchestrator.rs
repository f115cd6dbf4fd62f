//! Session cache orchestrator.
//!
//! ```text
//! TokenStore --> SessionCache --> AccountApi --> SessionStore
//!  (cookie)      (5 min TTL)      (backend)      (published)
//! ```
//!
//! Overlapping resolutions are de-duplicated: a caller joins the running
//! resolution when that one is at least as authoritative as what it asked
//! for. Each new resolution and each logout bumps a generation counter, and
//! only the resolution holding the current generation may write caches or
//! publish state. A resolution every caller has given up on is dropped.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use shared::types::{
    AppConfig, BanRecord, DEFAULT_CACHE_TTL, RoleMap, SessionAction, SessionState, SessionToken,
    UserProfile,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::{AccountApi, AccountOutcome, HttpBackend};
use crate::cache::{CacheStore, FileCacheStore, MemoryCacheStore, SessionCache};
use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::navigator::{LogNavigator, Navigator};
use crate::store::SessionStore;
use crate::token::{CookieFileTokenStore, MemoryTokenStore, TokenStore};

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Unauthenticated,
    Authenticated(UserProfile),
    Banned(BanRecord),
}

pub type ResolveResult = Result<Resolution, SessionError>;

/// What [`SessionService::initialize`] did.
#[derive(Debug)]
pub struct Startup {
    pub resolution: Resolution,
    /// Authoritative revalidation still running after a cached ban was shown.
    pub background: Option<JoinHandle<ResolveResult>>,
}

type SharedResolution = Shared<BoxFuture<'static, ResolveResult>>;

struct InFlight {
    token: SessionToken,
    forced: bool,
    generation: u64,
    /// Callers currently awaiting `future`.
    waiters: usize,
    future: SharedResolution,
}

struct Inner {
    tokens: Arc<dyn TokenStore>,
    cache: SessionCache,
    api: Arc<dyn AccountApi>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    home_path: String,
    generation: AtomicU64,
    /// Non-silent callers currently waiting on a resolution.
    loading: AtomicUsize,
    in_flight: Mutex<Option<InFlight>>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct SessionServiceBuilder {
    api: Arc<dyn AccountApi>,
    tokens: Arc<dyn TokenStore>,
    cache_store: Arc<dyn CacheStore>,
    cache_ttl: Duration,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    home_path: String,
    store: SessionStore,
}

impl SessionServiceBuilder {
    /// In-memory token and cache storage, system clock, log-only navigator.
    pub fn new(api: Arc<dyn AccountApi>) -> Self {
        Self {
            api,
            tokens: Arc::new(MemoryTokenStore::new()),
            cache_store: Arc::new(MemoryCacheStore::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
            clock: Arc::new(SystemClock),
            navigator: Arc::new(LogNavigator),
            home_path: "/".to_string(),
            store: SessionStore::new(),
        }
    }

    /// HTTP backend, cookie-file token store and (optionally) file-backed
    /// cache, all from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, SessionError> {
        let api = HttpBackend::from_config(&config.api)
            .map_err(|e| SessionError::Setup(e.to_string()))?;
        info!("Using backend at {}", api.base_url());

        let tokens = CookieFileTokenStore::new(
            &config.storage.cookie_file,
            &config.session.token_cookie,
        );

        let cache_store: Arc<dyn CacheStore> = match &config.storage.cache_dir {
            Some(dir) => Arc::new(FileCacheStore::new(dir).map_err(|e| {
                SessionError::Setup(format!("cannot use cache directory {}: {}", dir, e))
            })?),
            None => Arc::new(MemoryCacheStore::new()),
        };

        Ok(Self::new(Arc::new(api))
            .token_store(Arc::new(tokens))
            .cache_store(cache_store)
            .cache_ttl(config.session.cache_ttl())
            .home_path(&config.session.home_path))
    }

    pub fn token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn cache_store(mut self, cache_store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = cache_store;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn home_path(mut self, home_path: &str) -> Self {
        self.home_path = home_path.to_string();
        self
    }

    /// Publish into an existing store instead of a fresh one.
    pub fn state_store(mut self, store: SessionStore) -> Self {
        self.store = store;
        self
    }

    pub fn build(self) -> SessionService {
        SessionService {
            inner: Arc::new(Inner {
                tokens: self.tokens,
                cache: SessionCache::new(self.cache_store, self.cache_ttl),
                api: self.api,
                store: self.store,
                clock: self.clock,
                navigator: self.navigator,
                home_path: self.home_path,
                generation: AtomicU64::new(0),
                loading: AtomicUsize::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Resolves the current session and publishes it.
///
/// Cheap to clone; all clones drive the same caches and state.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<Inner>,
}

impl SessionService {
    pub fn builder(api: Arc<dyn AccountApi>) -> SessionServiceBuilder {
        SessionServiceBuilder::new(api)
    }

    pub fn state(&self) -> SessionState {
        self.inner.store.get_state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.store.subscribe()
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.inner.tokens.get_token()
    }

    /// Startup path.
    ///
    /// A cached ban is shown immediately and then revalidated in the
    /// background. A fresh, non-banned cached profile is used as-is without
    /// calling the backend. Otherwise this is a normal resolution.
    pub async fn initialize(&self) -> Result<Startup, SessionError> {
        let Some(token) = self.token() else {
            info!("No session token found at startup");
            self.inner.store.dispatch(SessionAction::LoggedOut);
            return Ok(Startup {
                resolution: Resolution::Unauthenticated,
                background: None,
            });
        };

        let now = self.inner.clock.now();

        if let Some(ban) = self.inner.cache.active_ban(now) {
            info!("Cached ban found at startup, revalidating in the background");
            self.inner.store.dispatch(SessionAction::Banned(ban.clone()));
            self.inner.finish_loading_if_idle();

            let service = self.clone();
            let background = tokio::spawn(async move {
                let result = service.resolve_session(Some(token), true, true).await;
                if let Err(e) = &result {
                    warn!("Background session revalidation failed: {}", e);
                }
                result
            });

            return Ok(Startup {
                resolution: Resolution::Banned(ban),
                background: Some(background),
            });
        }

        if let Some(user) = self.inner.cache.active_user(now) {
            info!("Session restored from cache");
            self.inner
                .store
                .dispatch(SessionAction::Authenticated(user.clone()));
            self.inner.finish_loading_if_idle();
            return Ok(Startup {
                resolution: Resolution::Authenticated(user),
                background: None,
            });
        }

        let resolution = self.resolve_session(Some(token), false, false).await?;
        Ok(Startup {
            resolution,
            background: None,
        })
    }

    /// Resolve `token` into a published session.
    ///
    /// `force_refresh` skips both caches. `silent` leaves the loading flag
    /// alone, for background revalidation.
    pub async fn resolve_session(
        &self,
        token: Option<SessionToken>,
        force_refresh: bool,
        silent: bool,
    ) -> ResolveResult {
        let Some(token) = token else {
            debug!("No session token, resolving as unauthenticated");
            self.inner.supersede();
            self.inner.store.dispatch(SessionAction::LoggedOut);
            return Ok(Resolution::Unauthenticated);
        };

        // Per caller: joining a silent resolution still raises loading.
        let _loading = (!silent).then(|| LoadingGuard::start(&self.inner));
        let (generation, future) = self.shared_resolution(token, force_refresh);
        let _waiter = Waiter {
            inner: &self.inner,
            generation,
        };

        future.await
    }

    /// Forced resolution of the stored token. `Ok(None)` when there is none.
    pub async fn refresh(&self, silent: bool) -> Result<Option<Resolution>, SessionError> {
        match self.token() {
            Some(token) => self.resolve_session(Some(token), true, silent).await.map(Some),
            None => {
                debug!("Refresh requested without a session token");
                Ok(None)
            }
        }
    }

    /// Drop the token, both cache entries and the published session, then
    /// redirect home. Safe to call any number of times.
    pub fn logout(&self) {
        self.inner.logout();
    }

    /// Join the running resolution if it satisfies this request, otherwise
    /// start a new one that supersedes it.
    fn shared_resolution(
        &self,
        token: SessionToken,
        force_refresh: bool,
    ) -> (u64, SharedResolution) {
        let mut slot = lock(&self.inner.in_flight);

        if let Some(current) = slot.as_mut() {
            let running = current.future.peek().is_none();
            if running && current.token == token && (current.forced || !force_refresh) {
                debug!(
                    "Joining in-flight session resolution (generation {})",
                    current.generation
                );
                current.waiters += 1;
                return (current.generation, current.future.clone());
            }
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let resolve_token = token.clone();
        let future = async move {
            inner
                .resolve(resolve_token, force_refresh, generation)
                .await
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            token,
            forced: force_refresh,
            generation,
            waiters: 1,
            future: future.clone(),
        });

        (generation, future)
    }
}

// ---------------------------------------------------------------------------
// Resolution steps
// ---------------------------------------------------------------------------

impl Inner {
    async fn resolve(
        &self,
        token: SessionToken,
        force_refresh: bool,
        generation: u64,
    ) -> ResolveResult {
        let now = self.clock.now();

        if !force_refresh {
            if let Some(ban) = self.cache.active_ban(now) {
                // Shown right away, but a cached ban is always revalidated.
                debug!("Publishing cached ban while revalidating");
                self.publish(generation, SessionAction::Banned(ban))?;
            } else if let Some(user) = self.cache.active_user(now) {
                debug!("Session served from cache");
                self.publish(generation, SessionAction::Authenticated(user.clone()))?;
                return Ok(Resolution::Authenticated(user));
            }
        }

        self.revalidate(&token, generation).await
    }

    async fn revalidate(&self, token: &SessionToken, generation: u64) -> ResolveResult {
        info!("Validating session {:?} with the backend", token);

        let account = match self.api.fetch_account(token).await {
            Ok(AccountOutcome::Active(account)) => account,
            Ok(AccountOutcome::Banned(record)) => return self.apply_ban(generation, record),
            Err(e) => return Err(self.fail(generation, SessionError::Account(e))),
        };

        self.ensure_current(generation)?;
        self.cache.ban.clear();

        let (staff, divisions) = match tokio::try_join!(
            self.api.fetch_staff_role(token),
            self.api.fetch_division_roles(token)
        ) {
            Ok(roles) => roles,
            Err(e) => return Err(self.fail(generation, SessionError::Roles(e))),
        };

        let profile = UserProfile::from_account(account, RoleMap::merge(&staff, &divisions));

        self.ensure_current(generation)?;
        self.cache.user.store(&profile, self.clock.now());
        self.store
            .dispatch(SessionAction::Authenticated(profile.clone()));

        info!("Session resolved with {} role(s)", profile.roles.len());
        Ok(Resolution::Authenticated(profile))
    }

    fn apply_ban(&self, generation: u64, record: BanRecord) -> ResolveResult {
        self.ensure_current(generation)?;
        warn!("Session is {}", record);

        self.cache.ban.store(&record, self.clock.now());
        self.cache.user.clear();
        self.store.dispatch(SessionAction::Banned(record.clone()));

        Ok(Resolution::Banned(record))
    }

    /// Failed authoritative lookup: tear the session down, unless a newer
    /// resolution or a logout already took over.
    fn fail(&self, generation: u64, err: SessionError) -> SessionError {
        if self.is_current(generation) {
            error!("{}, logging out", err);
            self.logout();
            err
        } else {
            debug!("Ignoring failure of superseded resolution: {}", err);
            SessionError::Superseded
        }
    }

    fn logout(&self) {
        self.supersede();

        self.tokens.remove_token();
        self.cache.clear_all();
        self.store.dispatch(SessionAction::LoggedOut);

        info!("Logged out");
        self.navigator.redirect(&self.home_path);
    }

    /// Invalidate whatever resolution is running.
    fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *lock(&self.in_flight) = None;
    }

    fn publish(&self, generation: u64, action: SessionAction) -> Result<(), SessionError> {
        self.ensure_current(generation)?;
        self.store.dispatch(action);
        Ok(())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn ensure_current(&self, generation: u64) -> Result<(), SessionError> {
        if self.is_current(generation) {
            Ok(())
        } else {
            debug!("Resolution {} superseded", generation);
            Err(SessionError::Superseded)
        }
    }

    fn finish_loading_if_idle(&self) {
        if self.loading.load(Ordering::SeqCst) == 0 {
            self.store.dispatch(SessionAction::LoadingFinished);
        }
    }
}

/// Holds the loading flag up while a non-silent caller waits.
struct LoadingGuard<'a> {
    inner: &'a Inner,
}

impl<'a> LoadingGuard<'a> {
    fn start(inner: &'a Inner) -> Self {
        inner.loading.fetch_add(1, Ordering::SeqCst);
        inner.store.dispatch(SessionAction::LoadingStarted);
        Self { inner }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.inner.loading.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.store.dispatch(SessionAction::LoadingFinished);
        }
    }
}

/// One caller awaiting an in-flight resolution. The last one to leave,
/// finished or cancelled, frees the slot.
struct Waiter<'a> {
    inner: &'a Inner,
    generation: u64,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let mut slot = lock(&self.inner.in_flight);
        let Some(current) = slot.as_mut() else {
            return;
        };
        if current.generation != self.generation {
            return;
        }

        current.waiters = current.waiters.saturating_sub(1);
        if current.waiters > 0 {
            return;
        }

        let abandoned = slot.take();
        drop(slot);
        if abandoned.is_some_and(|f| f.future.peek().is_none()) {
            debug!("Abandoning session resolution {}", self.generation);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
