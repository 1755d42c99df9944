//! Versioned cache stores and their registry.
//!
//! A [`Cache`] holds the (path, response) pairs for one deployed version and
//! is named after it (e.g. `parish-mkw-v1`). The [`CacheStorage`] registry
//! owns every store for the origin and optionally snapshots each store to a
//! JSON file so a populated cache survives process restarts.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use parishkit_net::Response;

use crate::SwError;

/// A cached response for one asset path.
///
/// Entries are immutable once written: the fetch path never writes to the
/// cache, and a new deployment repopulates a fresh store wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Root-relative request path (plus query, if any).
    pub path: String,
    /// Request method. Effectively always `GET`.
    pub method: String,
    /// Response status.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Stored-at timestamp (ms since epoch).
    pub stored_at: u64,
}

impl CacheEntry {
    /// Capture a fetched response under the given path.
    ///
    /// Header values that are not valid UTF-8 are dropped.
    pub fn from_response(path: impl Into<String>, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            path: path.into(),
            method: "GET".to_string(),
            status: response.status.as_u16(),
            headers,
            body: response.body.to_vec(),
            stored_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }

    /// Rebuild the stored response verbatim, addressed at `url`.
    pub fn to_response(&self, url: Url) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        Response {
            url,
            status: StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            body: bytes::Bytes::from(self.body.clone()),
        }
    }
}

/// One version's cache store.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Cache {
    name: String,
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create an empty store.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry by path.
    pub fn lookup(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    /// Insert an entry, keyed by its path.
    pub fn insert(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    /// All cached paths.
    pub fn paths(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry of every cache store for the origin.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
    persist_dir: Option<PathBuf>,
}

impl CacheStorage {
    /// Create an in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a disk-backed registry, reloading any snapshots found in `dir`.
    ///
    /// A snapshot that fails to parse is skipped with a warning; the next
    /// install rewrites it.
    pub fn persistent(dir: impl Into<PathBuf>) -> Result<Self, SwError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut caches = HashMap::new();
        for dir_entry in std::fs::read_dir(&dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_snapshot(&path) {
                Ok(cache) => {
                    debug!(cache = %cache.name(), entries = cache.len(), "reloaded cache snapshot");
                    caches.insert(cache.name().to_string(), cache);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable cache snapshot");
                }
            }
        }

        Ok(Self {
            caches,
            persist_dir: Some(dir),
        })
    }

    fn load_snapshot(path: &Path) -> Result<Cache, SwError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn snapshot_path(&self, name: &str) -> Option<PathBuf> {
        self.persist_dir
            .as_ref()
            .map(|dir| dir.join(format!("{name}.json")))
    }

    /// Open (or create) a store by name.
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Check whether a store exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Get a store by name without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Names of every store.
    pub fn names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    /// Delete a store and its snapshot. Returns whether the store existed.
    pub fn delete(&mut self, name: &str) -> Result<bool, SwError> {
        let existed = self.caches.remove(name).is_some();
        if let Some(path) = self.snapshot_path(name) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SwError::Storage(e)),
            }
        }
        Ok(existed)
    }

    /// Look up a path in one named store.
    pub fn lookup_in(&self, name: &str, path: &str) -> Option<&CacheEntry> {
        self.caches.get(name).and_then(|cache| cache.lookup(path))
    }

    /// Look up a path across every store.
    ///
    /// This mirrors the loose lookup the fetch handler may be configured
    /// with: a stale, not-yet-deleted store can satisfy the match.
    pub fn lookup_any(&self, path: &str) -> Option<&CacheEntry> {
        self.caches.values().find_map(|cache| cache.lookup(path))
    }

    /// Write the named store's snapshot, if this registry is disk-backed.
    pub fn commit(&self, name: &str) -> Result<(), SwError> {
        let (Some(path), Some(cache)) = (self.snapshot_path(name), self.caches.get(name)) else {
            return Ok(());
        };
        let contents = serde_json::to_string(cache)?;
        std::fs::write(&path, contents)?;
        debug!(cache = %name, file = %path.display(), "wrote cache snapshot");
        Ok(())
    }
}
