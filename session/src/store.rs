use std::sync::Arc;

use shared::types::{SessionAction, SessionState, reduce};
use tokio::sync::watch;
use tracing::debug;

/// Published session state.
///
/// A cheaply cloneable container: every clone shares the same state and
/// subscribers. Changes only go through [`dispatch`](Self::dispatch), which
/// runs the reducer and notifies subscribers when the state actually
/// changed.
#[derive(Clone, Debug)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_state(SessionState::initial())
    }

    pub fn with_state(state: SessionState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current state.
    pub fn get_state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn dispatch(&self, action: SessionAction) {
        self.tx.send_if_modified(|state| {
            let next = reduce(state, action);
            if next == *state {
                return false;
            }
            debug!(
                "Session state: authenticated={} banned={} loading={}",
                next.is_authenticated(),
                next.is_banned(),
                next.loading
            );
            *state = next;
            true
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
