//! # ParishKit SW
//!
//! Offline cache worker for the parish web client.
//!
//! ## Features
//!
//! - **Install**: all-or-nothing caching of the asset manifest
//! - **Activate**: batch removal of stale cache stores
//! - **Fetch interception**: cache-first, network fallback, offline page
//! - **Host signals**: skip-waiting and client-claim notifications
//!
//! ## Architecture
//!
//! ```text
//! OfflineWorker
//!     ├── Manifest (install-time asset list + offline fallback page)
//!     ├── CacheStorage
//!     │       └── Cache ("parish-mkw-v1")
//!     │               └── path → CacheEntry
//!     └── Fetcher (network boundary, parishkit-net)
//! ```

use thiserror::Error;

use parishkit_net::NetError;

pub mod cache;
pub mod manifest;
pub mod worker;

pub use cache::{Cache, CacheEntry, CacheStorage};
pub use manifest::Manifest;
pub use worker::{FetchOutcome, LookupScope, OfflineWorker, ServedFrom, WorkerConfig};

/// Errors that can occur in the offline cache worker.
#[derive(Error, Debug)]
pub enum SwError {
    /// The whole install attempt failed; no partial cache state is kept.
    #[error("Install failed for {path}: {source}")]
    InstallFailed { path: String, source: NetError },

    /// An operation was driven in a state that does not allow it.
    #[error("{operation} is invalid in state {from:?}")]
    InvalidState {
        from: WorkerState,
        operation: &'static str,
    },

    /// Network failed and the offline fallback page is not cached.
    #[error("Network unreachable and offline fallback not cached: {source}")]
    Unreachable { source: NetError },

    /// Manifest construction or resolution failure.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Snapshot or store I/O failure.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Snapshot encoding failure.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Worker lifecycle states.
///
/// There is no waiting phase: install always requests skip-waiting, so an
/// installed worker proceeds straight to activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet installing.
    Parsed,
    /// Install event in flight.
    Installing,
    /// Install succeeded; may already serve fetches.
    Installed,
    /// Activate event in flight.
    Activating,
    /// Active and serving.
    Activated,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Parsed
    }
}

/// Control signals the worker raises toward the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// Activate this instance without waiting for a prior instance to release.
    SkipWaiting,
    /// Take control of already-open clients immediately.
    ClaimClients,
}

/// A versioned cache store name, `"<app-id>-v<version>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheName(String);

impl CacheName {
    /// Build the store name for an app id and version tag.
    pub fn new(app_id: &str, version: u32) -> Self {
        Self(format!("{app_id}-v{version}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_name_format() {
        let name = CacheName::new("parish-mkw", 1);
        assert_eq!(name.as_str(), "parish-mkw-v1");
        assert_eq!(name.to_string(), "parish-mkw-v1");
    }

    #[test]
    fn test_cache_name_versions_differ() {
        assert_ne!(CacheName::new("parish-mkw", 1), CacheName::new("parish-mkw", 2));
    }

    #[test]
    fn test_worker_initial_state() {
        assert_eq!(WorkerState::default(), WorkerState::Parsed);
    }
}
