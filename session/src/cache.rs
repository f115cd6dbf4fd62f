//! Local cache layer: two advisory records (user profile, ban status) kept
//! in ephemeral key/value storage with a shared TTL rule.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::types::{BanRecord, CacheEntry, UserProfile};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Storage back-ends
// ---------------------------------------------------------------------------

/// String key/value storage the cache records are serialized into.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// Process-local storage; gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// One `<key>.json` file per record inside a directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read cache file for {}: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: String) {
        if let Err(e) = fs::write(self.path_for(key), value) {
            warn!("Failed to write cache file for {}: {}", key, e);
        }
    }

    fn remove(&self, key: &str) {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove cache file for {}: {}", key, e),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache kinds
// ---------------------------------------------------------------------------

/// Describes one cached record: where it is stored, the name of its payload
/// field, and an optional payload-specific expiry.
pub trait CacheKind {
    type Payload: Serialize + DeserializeOwned + Clone;

    const STORAGE_KEY: &'static str;
    const PAYLOAD_FIELD: &'static str;

    fn expires_at(_payload: &Self::Payload) -> Option<DateTime<Utc>> {
        None
    }
}

/// `userData`: `{user, timestamp}`
#[derive(Debug)]
pub struct UserCache;

impl CacheKind for UserCache {
    type Payload = UserProfile;

    const STORAGE_KEY: &'static str = "userData";
    const PAYLOAD_FIELD: &'static str = "user";
}

/// `bannedInfo`: `{banned, timestamp}`. Also lapses at the ban's expiry.
#[derive(Debug)]
pub struct BanCache;

impl CacheKind for BanCache {
    type Payload = BanRecord;

    const STORAGE_KEY: &'static str = "bannedInfo";
    const PAYLOAD_FIELD: &'static str = "banned";

    fn expires_at(payload: &BanRecord) -> Option<DateTime<Utc>> {
        payload.expires_at
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A cached authoritative record of kind `K`.
pub struct CachedRecord<K: CacheKind> {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    _kind: PhantomData<K>,
}

impl<K: CacheKind> CachedRecord<K> {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            _kind: PhantomData,
        }
    }

    /// The stored entry regardless of age. Corrupt entries are dropped and
    /// reported as a miss.
    pub fn load_entry(&self) -> Option<CacheEntry<K::Payload>> {
        let raw = self.store.get(K::STORAGE_KEY)?;
        match CacheEntry::from_json(&raw, K::PAYLOAD_FIELD) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding corrupt {} cache entry: {}", K::STORAGE_KEY, e);
                self.store.remove(K::STORAGE_KEY);
                None
            }
        }
    }

    /// The payload if the entry is still valid at `now`.
    pub fn load(&self, now: DateTime<Utc>) -> Option<K::Payload> {
        let entry = self.load_entry()?;
        if entry.is_valid_with(now, self.ttl, K::expires_at) {
            debug!(
                "{} cache hit (age {} ms)",
                K::STORAGE_KEY,
                entry.age_millis(now)
            );
            Some(entry.payload)
        } else {
            debug!(
                "{} cache entry is stale (age {} ms)",
                K::STORAGE_KEY,
                entry.age_millis(now)
            );
            None
        }
    }

    pub fn store(&self, payload: &K::Payload, now: DateTime<Utc>) {
        let entry = CacheEntry::new(payload.clone(), now);
        match entry.to_json(K::PAYLOAD_FIELD) {
            Ok(raw) => self.store.set(K::STORAGE_KEY, raw),
            Err(e) => warn!("Failed to serialize {} cache entry: {}", K::STORAGE_KEY, e),
        }
    }

    pub fn clear(&self) {
        self.store.remove(K::STORAGE_KEY);
    }
}

/// The two records the orchestrator works with, sharing one store and TTL.
pub struct SessionCache {
    pub user: CachedRecord<UserCache>,
    pub ban: CachedRecord<BanCache>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            user: CachedRecord::new(Arc::clone(&store), ttl),
            ban: CachedRecord::new(store, ttl),
        }
    }

    /// A cached ban that is still in force at `now`.
    pub fn active_ban(&self, now: DateTime<Utc>) -> Option<BanRecord> {
        self.ban.load(now).filter(|ban| ban.is_active(now))
    }

    /// A cached profile that is fresh and not itself flagged as banned.
    pub fn active_user(&self, now: DateTime<Utc>) -> Option<UserProfile> {
        self.user.load(now).filter(|user| !user.is_banned())
    }

    pub fn clear_all(&self) {
        self.user.clear();
        self.ban.clear();
    }
}
