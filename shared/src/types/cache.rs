use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::{Map, Value};

/// How long a cached record may short-circuit the backend (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached payload and the moment it was written, in Unix milliseconds.
///
/// Stored as `{"<field>": payload, "timestamp": ms}`. The payload field name
/// differs per cache kind (`user`, `banned`), so it is passed in rather than
/// fixed by a derive.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(payload: T, now: DateTime<Utc>) -> Self {
        Self {
            payload,
            timestamp: now.timestamp_millis(),
        }
    }

    /// Age of the entry in milliseconds. Negative if written "in the future".
    pub fn age_millis(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis().saturating_sub(self.timestamp)
    }

    /// Valid while younger than `ttl`.
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_valid_with(now, ttl, |_| None)
    }

    /// Valid while younger than `ttl` and, when `expires_at` yields an
    /// instant for the payload, while `now` is still before it.
    pub fn is_valid_with<F>(&self, now: DateTime<Utc>, ttl: Duration, expires_at: F) -> bool
    where
        F: Fn(&T) -> Option<DateTime<Utc>>,
    {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        if self.age_millis(now) >= ttl_ms {
            return false;
        }
        match expires_at(&self.payload) {
            Some(at) => now < at,
            None => true,
        }
    }
}

impl<T: Serialize> CacheEntry<T> {
    pub fn to_json(&self, field: &str) -> serde_json::Result<String> {
        let mut object = Map::new();
        object.insert(field.to_string(), serde_json::to_value(&self.payload)?);
        object.insert("timestamp".to_string(), Value::from(self.timestamp));
        serde_json::to_string(&Value::Object(object))
    }
}

impl<T: DeserializeOwned> CacheEntry<T> {
    pub fn from_json(raw: &str, field: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut object) = value else {
            return Err(serde_json::Error::custom("cache entry is not a JSON object"));
        };

        let timestamp = object
            .get("timestamp")
            .and_then(Value::as_i64)
            .ok_or_else(|| serde_json::Error::custom("cache entry has no numeric timestamp"))?;

        let payload = object
            .remove(field)
            .ok_or_else(|| serde_json::Error::custom(format!("cache entry has no `{}`", field)))?;

        Ok(Self {
            payload: serde_json::from_value(payload)?,
            timestamp,
        })
    }
}
