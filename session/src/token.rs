use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use shared::types::SessionToken;
use tracing::{debug, warn};

/// Where the externally issued access token lives.
///
/// The orchestrator reads the token and may discard it on logout; it never
/// writes one.
pub trait TokenStore: Send + Sync {
    fn get_token(&self) -> Option<SessionToken>;
    fn remove_token(&self);
}

// ---------------------------------------------------------------------------
// Cookie jar file
// ---------------------------------------------------------------------------

/// Reads the token from a cookie-header style file, `name=value; name=value`
/// (newlines are accepted as separators too).
#[derive(Debug, Clone)]
pub struct CookieFileTokenStore {
    path: PathBuf,
    cookie_name: String,
}

impl CookieFileTokenStore {
    pub fn new(path: impl Into<PathBuf>, cookie_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_jar(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cookie file {} does not exist", self.path.display());
                None
            }
            Err(e) => {
                warn!("Failed to read cookie file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl TokenStore for CookieFileTokenStore {
    fn get_token(&self) -> Option<SessionToken> {
        let jar = self.read_jar()?;
        find_cookie(&jar, &self.cookie_name).and_then(SessionToken::new)
    }

    fn remove_token(&self) {
        let Some(jar) = self.read_jar() else {
            return;
        };

        let remaining = without_cookie(&jar, &self.cookie_name);
        let result = if remaining.is_empty() {
            fs::remove_file(&self.path)
        } else {
            fs::write(&self.path, remaining)
        };

        match result {
            Ok(()) => debug!("Removed cookie {} from {}", self.cookie_name, self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove cookie {} from {}: {}",
                self.cookie_name,
                self.path.display(),
                e
            ),
        }
    }
}

fn cookie_pairs(jar: &str) -> impl Iterator<Item = (&str, &str)> {
    jar.split([';', '\n']).filter_map(|cookie| {
        let mut parts = cookie.trim().splitn(2, '=');
        let name = parts.next()?.trim();
        let value = parts.next()?.trim();
        (!name.is_empty()).then_some((name, value))
    })
}

/// Extract cookie value by name
pub fn find_cookie(jar: &str, cookie_name: &str) -> Option<String> {
    cookie_pairs(jar)
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

fn without_cookie(jar: &str, cookie_name: &str) -> String {
    cookie_pairs(jar)
        .filter(|(name, _)| *name != cookie_name)
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// In-process store
// ---------------------------------------------------------------------------

/// Token held in memory, for embedding applications and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SessionToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(raw: &str) -> Self {
        Self {
            token: Mutex::new(SessionToken::new(raw)),
        }
    }

    pub fn set(&self, token: Option<SessionToken>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self) -> Option<SessionToken> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remove_token(&self) {
        self.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cookie_among_others() {
        let jar = "theme=dark; vatsim_token=abc.def; lang=en";
        assert_eq!(find_cookie(jar, "vatsim_token").as_deref(), Some("abc.def"));
        assert_eq!(find_cookie(jar, "missing"), None);
    }

    #[test]
    fn newline_separated_jar_and_quoted_values() {
        let jar = "theme=dark\nvatsim_token=\"abc\"\n";
        assert_eq!(find_cookie(jar, "vatsim_token").as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_values_may_contain_equals() {
        let jar = "vatsim_token=a=b==";
        assert_eq!(find_cookie(jar, "vatsim_token").as_deref(), Some("a=b=="));
    }

    #[test]
    fn file_store_reads_and_removes_only_its_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        fs::write(&path, "theme=dark; vatsim_token=tok123").unwrap();

        let store = CookieFileTokenStore::new(&path, "vatsim_token");
        assert_eq!(store.get_token().unwrap().as_str(), "tok123");

        store.remove_token();
        assert!(store.get_token().is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "theme=dark");
    }

    #[test]
    fn removing_last_cookie_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        fs::write(&path, "vatsim_token=tok123").unwrap();

        let store = CookieFileTokenStore::new(&path, "vatsim_token");
        store.remove_token();
        assert!(!path.exists());

        // Idempotent
        store.remove_token();
    }

    #[test]
    fn missing_file_or_blank_value_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        let store = CookieFileTokenStore::new(&path, "vatsim_token");
        assert!(store.get_token().is_none());

        fs::write(&path, "vatsim_token=   ").unwrap();
        assert!(store.get_token().is_none());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::with_token("tok");
        assert_eq!(store.get_token().unwrap().as_str(), "tok");
        store.remove_token();
        assert!(store.get_token().is_none());
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn token_is_found_wherever_it_sits(
                value in "[A-Za-z0-9._-]{1,64}",
                before in proptest::collection::vec("[a-z]{1,8}=[a-z0-9]{0,8}", 0..4),
                after in proptest::collection::vec("[a-z]{1,8}=[a-z0-9]{0,8}", 0..4),
            ) {
                let mut cookies = before;
                cookies.push(format!("vatsim_token={}", value));
                cookies.extend(after);
                let jar = cookies.join("; ");

                prop_assert_eq!(find_cookie(&jar, "vatsim_token"), Some(value));
                prop_assert!(!without_cookie(&jar, "vatsim_token").contains("vatsim_token"));
            }
        }
    }
}
