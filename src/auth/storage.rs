use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lifetime of the cookie-tier session entries.
pub const COOKIE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session storage is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Port for the key-value places a session can be persisted to
/// (browser-style local storage, a cookie jar, a file on disk).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`. With a `ttl` the entry disappears once it elapses.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ── In-memory store ──

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    ttl: Option<Duration>,
}

struct EntryExpiry;

impl Expiry<String, MemoryEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Process-local store with per-entry expiry.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .expire_after(EntryExpiry)
            .build();
        Self { cache }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).map(|entry| entry.value)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StorageError> {
        self.cache.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                ttl,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.cache.invalidate(key);
        Ok(())
    }
}

// ── File-backed store ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// JSON file store so a CLI session survives restarts. Every write rewrites the file.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, FileEntry>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. Expired entries are dropped on load.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => {
                let mut entries: HashMap<String, FileEntry> = serde_json::from_slice(&bytes)?;
                let now = Utc::now();
                entries.retain(|_, entry| entry.is_live(now));
                entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened session file");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, FileEntry>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StorageError> {
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl);

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            FileEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

// ── Session storage tiers ──

/// The two places a session is mirrored to: the primary local store and an
/// optional cookie tier whose entries expire after [`COOKIE_TTL`].
#[derive(Clone)]
pub struct SessionStorage {
    local: Arc<dyn KeyValueStore>,
    cookies: Option<Arc<dyn KeyValueStore>>,
}

impl SessionStorage {
    pub fn new(local: Arc<dyn KeyValueStore>, cookies: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self { local, cookies }
    }

    /// Both tiers held in memory. Used by tests and short-lived processes.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Some(Arc::new(MemoryStore::new())),
        )
    }

    pub fn local(&self) -> &dyn KeyValueStore {
        self.local.as_ref()
    }

    pub fn cookies(&self) -> Option<&dyn KeyValueStore> {
        self.cookies.as_deref()
    }

    pub(crate) fn set_local(&self, key: &str, value: &str) {
        if let Err(e) = self.local.set(key, value, None) {
            warn!(key, error = %e, "Failed to persist session entry");
        }
    }

    pub(crate) fn set_cookie(&self, key: &str, value: &str) {
        if let Some(cookies) = &self.cookies {
            if let Err(e) = cookies.set(key, value, Some(COOKIE_TTL)) {
                warn!(key, error = %e, "Failed to persist session cookie");
            }
        }
    }

    pub(crate) fn remove_everywhere(&self, key: &str) {
        if let Err(e) = self.local.remove(key) {
            warn!(key, error = %e, "Failed to remove session entry");
        }
        if let Some(cookies) = &self.cookies {
            if let Err(e) = cookies.remove(key) {
                warn!(key, error = %e, "Failed to remove session cookie");
            }
        }
    }
}

/// Storage key names shared with the web frontend.
pub mod keys {
    pub const AUTH_TOKEN: &str = "authToken";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const ID_TOKEN: &str = "idToken";
    pub const USER: &str = "user";
    pub const CODE_VERIFIER: &str = "code_verifier";
    pub const OAUTH_STATE: &str = "oauth_state";

    pub const COOKIE_AUTH_TOKEN: &str = "auth-token";
    pub const COOKIE_AUTH_USER: &str = "auth-user";

    /// Every key a session may leave behind.
    pub const ALL: [&str; 8] = [
        AUTH_TOKEN,
        ACCESS_TOKEN,
        ID_TOKEN,
        USER,
        CODE_VERIFIER,
        OAUTH_STATE,
        COOKIE_AUTH_TOKEN,
        COOKIE_AUTH_USER,
    ];
}
