use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::account::{DivisionRole, StaffRole};

/// Permission set attached to a resolved identity.
///
/// Serialized as a role-name to presence-flag object, e.g.
/// `{"admin":1,"tester":1}`, which is what the rest of the site checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMap(BTreeMap<String, u8>);

impl RoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the single staff role with every division role.
    pub fn merge(staff: &StaffRole, divisions: &[DivisionRole]) -> Self {
        let mut roles = Self::new();
        if let Some(role) = staff.role.as_deref() {
            roles.insert(role);
        }
        for division in divisions {
            roles.insert(&division.role);
        }
        roles
    }

    /// Mark `role` present. Blank names are ignored.
    pub fn insert(&mut self, role: &str) {
        let role = role.trim();
        if !role.is_empty() {
            self.0.insert(role.to_string(), 1);
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.get(role).is_some_and(|flag| *flag != 0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
