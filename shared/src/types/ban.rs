use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::expiry;

/// Authoritative statement that the current identity is barred from access.
///
/// Mirrors the backend's ban payload, both the `403` body and the
/// `banned: true` variant of a `200` account response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub banned: bool,
    #[serde(default)]
    pub reason: String,
    /// `None` means the ban does not lapse on its own.
    #[serde(default, deserialize_with = "expiry::deserialize")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BanRecord {
    pub fn new(reason: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            banned: true,
            reason: reason.into(),
            expires_at,
        }
    }

    /// True once `now` has reached the ban's expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.banned && !self.is_expired(now)
    }
}

impl fmt::Display for BanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = if self.reason.is_empty() {
            "no reason given"
        } else {
            self.reason.as_str()
        };
        match self.expires_at {
            Some(at) => write!(f, "banned until {} ({})", at.to_rfc3339(), reason),
            None => write!(f, "banned indefinitely ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn ban_without_expiry_never_expires() {
        let ban = BanRecord::new("spam", None);
        assert!(!ban.is_expired(at(i32::MAX as i64)));
        assert!(ban.is_active(at(0)));
    }

    #[test]
    fn ban_expires_exactly_at_expiry() {
        let expiry = at(1_700_000_000);
        let ban = BanRecord::new("spam", Some(expiry));
        assert!(!ban.is_expired(expiry - Duration::seconds(1)));
        assert!(ban.is_expired(expiry));
        assert!(!ban.is_active(expiry));
    }

    #[test]
    fn sql_style_expiry_decodes() {
        let ban: BanRecord = serde_json::from_str(
            r#"{"banned":true,"reason":"spam","expires_at":"2023-11-14 22:13:20"}"#,
        )
        .unwrap();
        assert_eq!(ban.expires_at, Some(at(1_700_000_000)));

        let ban: BanRecord =
            serde_json::from_str(r#"{"banned":true,"expires_at":1700000000000}"#).unwrap();
        assert_eq!(ban.expires_at, Some(at(1_700_000_000)));

        let ban: BanRecord =
            serde_json::from_str(r#"{"banned":true,"expires_at":null}"#).unwrap();
        assert_eq!(ban.expires_at, None);
    }

    #[test]
    fn expiry_is_written_back_as_rfc3339() {
        let ban = BanRecord::new("spam", Some(at(1_700_000_000)));
        let json = serde_json::to_value(&ban).unwrap();
        assert_eq!(json["expires_at"], "2023-11-14T22:13:20Z");
        assert_eq!(serde_json::from_value::<BanRecord>(json).unwrap(), ban);
    }

    #[test]
    fn lifted_record_is_not_active() {
        let mut ban = BanRecord::new("spam", None);
        ban.banned = false;
        assert!(!ban.is_active(at(0)));
    }
}
