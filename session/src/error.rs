use thiserror::Error;

/// Failures talking to the community backend.
///
/// `Clone` so one failed request can be reported to every caller that was
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Failed to decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Invalid backend client configuration: {0}")]
    Config(String),
}

/// Failures of a session resolution.
///
/// A ban is not an error; it comes back as `Resolution::Banned`.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Account validation failed: {0}")]
    Account(BackendError),

    #[error("Role lookup failed: {0}")]
    Roles(BackendError),

    /// A newer resolution or a logout started while this one was running;
    /// its outcome was discarded.
    #[error("Session resolution was superseded")]
    Superseded,

    #[error("Failed to set up session service: {0}")]
    Setup(String),
}

impl SessionError {
    /// True for failures that cleared the session (account or role lookups).
    pub fn logged_out(&self) -> bool {
        matches!(self, Self::Account(_) | Self::Roles(_))
    }
}
