use tracing::info;

/// Sends the user somewhere after the session is torn down.
pub trait Navigator: Send + Sync {
    fn redirect(&self, destination: &str);
}

/// Only records the redirect in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, destination: &str) {
        info!("Redirecting to {}", destination);
    }
}
