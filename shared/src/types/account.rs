use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ban::BanRecord;
use crate::types::expiry;
use crate::types::roles::RoleMap;

// ---------------------------------------------------------------------------
// Backend wire types
// ---------------------------------------------------------------------------

/// Body of `GET /auth/account`.
///
/// Only the ban fields are typed. Every other account field is kept as-is
/// in `fields`, so the resolved profile carries whatever the backend sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountPayload {
    #[serde(default)]
    pub banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(
        default,
        deserialize_with = "expiry::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AccountPayload {
    /// The ban carried by this payload, if it reports one.
    pub fn ban_record(&self) -> Option<BanRecord> {
        self.banned.then(|| BanRecord {
            banned: true,
            reason: self.reason.clone().unwrap_or_default(),
            expires_at: self.expires_at,
        })
    }
}

/// Body of `GET /auth/is-staff`. Non-staff accounts get `{}` or `{"role":null}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRole {
    #[serde(default)]
    pub role: Option<String>,
}

/// One element of `GET /divisions/user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionRole {
    pub role: String,
}

// ---------------------------------------------------------------------------
// Resolved identity
// ---------------------------------------------------------------------------

/// Account fields plus the merged role mapping.
///
/// This is the value published to consumers and written to the user cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub account: Map<String, Value>,
    #[serde(default)]
    pub roles: RoleMap,
}

impl UserProfile {
    /// Attach `roles` to a non-banned account payload.
    pub fn from_account(payload: AccountPayload, roles: RoleMap) -> Self {
        let mut account = payload.fields;
        account.remove("roles");
        account.insert("banned".to_string(), Value::Bool(payload.banned));
        Self { account, roles }
    }

    pub fn is_banned(&self) -> bool {
        self.account
            .get("banned")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.account.get(name)
    }

    /// `name` when the backend sent one, otherwise the member `cid`.
    pub fn display_name(&self) -> Option<String> {
        match (self.field("name"), self.field("cid")) {
            (Some(Value::String(name)), _) if !name.trim().is_empty() => Some(name.clone()),
            (_, Some(Value::Number(cid))) => Some(cid.to_string()),
            (_, Some(Value::String(cid))) if !cid.is_empty() => Some(cid.clone()),
            _ => None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
