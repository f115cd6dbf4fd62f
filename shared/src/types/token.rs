use std::fmt;

/// Opaque access token issued by the community backend.
///
/// The orchestrator only ever reads and forwards it. `Debug` is redacted so
/// the token never lands in log output by accident.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token. Blank values are not tokens and yield `None`.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(Self(raw))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short, log-safe fingerprint: the first four characters.
    pub fn fingerprint(&self) -> String {
        let head: String = self.0.chars().take(4).collect();
        format!("{}...", head)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.fingerprint())
    }
}
