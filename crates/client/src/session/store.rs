//! Durable storage for session tokens.
//!
//! The store is a flat string-to-string map with a synchronous,
//! infallible interface: signing out must always succeed, so storage
//! failures are logged and absorbed rather than returned. Payloads are
//! a handful of short strings, so the synchronous file writes stay
//! cheap.
//!
//! Only the session manager writes here. Everything else reads
//! session state through the manager.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

/// Keys the session manager persists under.
pub mod keys {
    /// The short-lived access token.
    pub const ACCESS_TOKEN: &str = "access_token";
    /// The long-lived refresh token.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Duplicate of the refresh token under the key older builds still
    /// read. Kept in lockstep with [`REFRESH_TOKEN`] on every write and
    /// every clear.
    pub const REFRESH_TOKEN_LEGACY: &str = "refreshToken";
}

/// Durable key-value storage for session tokens.
pub trait TokenStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&self, key: &str, value: &str);

    /// Delete a value. Deleting an absent key is a no-op.
    fn remove(&self, key: &str);

    /// The stored access token, if any.
    fn access_token(&self) -> Option<String> {
        self.get(keys::ACCESS_TOKEN)
    }

    /// The stored refresh token, falling back to the legacy key for
    /// sessions written by older builds.
    fn refresh_token(&self) -> Option<String> {
        self.get(keys::REFRESH_TOKEN)
            .or_else(|| self.get(keys::REFRESH_TOKEN_LEGACY))
    }

    /// Persist a token pair, keeping the legacy refresh key in sync.
    fn store_pair(&self, access: &str, refresh: &str) {
        self.set(keys::ACCESS_TOKEN, access);
        self.set(keys::REFRESH_TOKEN, refresh);
        self.set(keys::REFRESH_TOKEN_LEGACY, refresh);
    }

    /// Remove every session key as a unit.
    fn clear_session(&self) {
        self.remove(keys::ACCESS_TOKEN);
        self.remove(keys::REFRESH_TOKEN);
        self.remove(keys::REFRESH_TOKEN_LEGACY);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File-backed store
// ─────────────────────────────────────────────────────────────────────────────

/// Token store persisted as a JSON object on disk.
pub struct FileTokenStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileTokenStore {
    /// Open a store at `path`, loading any existing contents.
    ///
    /// A missing file starts the store empty. An unreadable or corrupt
    /// file is logged and treated the same way, so a damaged store
    /// never blocks sign-in.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "token store corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "token store unreadable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    /// Write the current map to disk via a temp file and rename, so a
    /// crash mid-write leaves the previous contents intact.
    fn persist(&self, cache: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(err) = fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), error = %err, "failed to create token store directory");
            return;
        }

        let contents = match serde_json::to_string_pretty(cache) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(error = %err, "failed to serialize token store");
                return;
            }
        };

        let tmp = self.path.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp, contents) {
            warn!(path = %tmp.display(), error = %err, "failed to write token store");
            return;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)) {
                warn!(path = %tmp.display(), error = %err, "failed to restrict token store permissions");
            }
        }

        if let Err(err) = fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to persist token store");
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key.to_owned(), value.to_owned());
        self.persist(&cache);
    }

    fn remove(&self, key: &str) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.remove(key).is_some() {
            self.persist(&cache);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Token store that lives and dies with the process. Used by tests and
/// by embedders that manage durability themselves.
#[derive(Default)]
pub struct MemoryTokenStore {
    cache: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.remove(key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.get("missing").is_none());

        store.set("k", "v");
        assert_eq!(store.get("k").unwrap(), "v");

        store.remove("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::open(&path);
        store.store_pair("access-jwt", "refresh-jwt");
        drop(store);

        let reopened = FileTokenStore::open(&path);
        assert_eq!(reopened.access_token().unwrap(), "access-jwt");
        assert_eq!(reopened.refresh_token().unwrap(), "refresh-jwt");
    }

    #[test]
    fn test_store_pair_duplicates_refresh_under_legacy_key() {
        let store = MemoryTokenStore::new();
        store.store_pair("a", "r");

        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), "r");
        assert_eq!(store.get(keys::REFRESH_TOKEN_LEGACY).unwrap(), "r");
    }

    #[test]
    fn test_refresh_token_falls_back_to_legacy_key() {
        let store = MemoryTokenStore::new();
        store.set(keys::REFRESH_TOKEN_LEGACY, "old-format");

        assert_eq!(store.refresh_token().unwrap(), "old-format");

        store.set(keys::REFRESH_TOKEN, "new-format");
        assert_eq!(store.refresh_token().unwrap(), "new-format");
    }

    #[test]
    fn test_clear_session_removes_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileTokenStore::open(&path);
        store.store_pair("a", "r");
        store.clear_session();

        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());

        let reopened = FileTokenStore::open(&path);
        assert!(reopened.access_token().is_none());
        assert!(reopened.refresh_token().is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileTokenStore::open(&path);
        assert!(store.access_token().is_none());

        store.set("k", "v");
        assert_eq!(store.get("k").unwrap(), "v");
    }

    #[test]
    fn test_open_creates_parent_directories_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("tokens.json");

        let store = FileTokenStore::open(&path);
        store.set("k", "v");

        let reopened = FileTokenStore::open(&path);
        assert_eq!(reopened.get("k").unwrap(), "v");
    }
}
