//! Session cache orchestrator for the community site.
//!
//! Reads the externally issued access token, serves the session from a
//! short-lived local cache when it can, revalidates against the backend,
//! and publishes the merged state (`user`, `loading`, `bannedInfo`) to
//! subscribers.
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use session::SessionServiceBuilder;
//!
//! let config = shared::config::load_config("session.toml")?;
//! let service = SessionServiceBuilder::from_config(&config)?.build();
//!
//! let mut updates = service.subscribe();
//! service.initialize().await?;
//! println!("{:?}", updates.borrow_and_update().user);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod clock;
pub mod error;
pub mod navigator;
pub mod orchestrator;
pub mod store;
pub mod token;

pub use backend::{AccountApi, AccountOutcome, HttpBackend};
pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore, SessionCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BackendError, SessionError};
pub use navigator::{LogNavigator, Navigator};
pub use orchestrator::{Resolution, SessionService, SessionServiceBuilder, Startup};
pub use store::SessionStore;
pub use token::{CookieFileTokenStore, MemoryTokenStore, TokenStore};
