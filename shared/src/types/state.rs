use serde::Serialize;

use crate::types::account::UserProfile;
use crate::types::ban::BanRecord;

/// What the rest of the application sees about the current session.
///
/// At most one of `user` and `banned_info` is ever set; [`reduce`] is the
/// only way state changes and it upholds that.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub loading: bool,
    #[serde(rename = "bannedInfo")]
    pub banned_info: Option<BanRecord>,
}

impl SessionState {
    /// State before the session has been looked at: nothing known, loading.
    pub fn initial() -> Self {
        Self {
            user: None,
            loading: true,
            banned_info: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_banned(&self) -> bool {
        self.banned_info.is_some()
    }
}

/// State transitions published by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    LoadingStarted,
    LoadingFinished,
    Authenticated(UserProfile),
    Banned(BanRecord),
    LoggedOut,
}

pub fn reduce(state: &SessionState, action: SessionAction) -> SessionState {
    match action {
        SessionAction::LoadingStarted => SessionState {
            loading: true,
            ..state.clone()
        },
        SessionAction::LoadingFinished => SessionState {
            loading: false,
            ..state.clone()
        },
        SessionAction::Authenticated(user) => SessionState {
            user: Some(user),
            loading: state.loading,
            banned_info: None,
        },
        SessionAction::Banned(record) => SessionState {
            user: None,
            loading: state.loading,
            banned_info: Some(record),
        },
        SessionAction::LoggedOut => SessionState::default(),
    }
}
