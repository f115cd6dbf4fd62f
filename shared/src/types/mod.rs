pub mod account;
pub mod app_config;
pub mod ban;
pub mod cache;
pub mod expiry;
pub mod json_error;
pub mod roles;
pub mod state;
pub mod token;

pub use self::account::{AccountPayload, DivisionRole, StaffRole, UserProfile};
pub use self::app_config::{ApiConfig, AppConfig, ConfigError, SessionConfig, StorageConfig};
pub use self::ban::BanRecord;
pub use self::cache::{CacheEntry, DEFAULT_CACHE_TTL};
pub use self::expiry::parse_expiry;
pub use self::json_error::ErrorResponse;
pub use self::roles::RoleMap;
pub use self::state::{SessionAction, SessionState, reduce};
pub use self::token::SessionToken;
