//! Worker lifecycle and fetch interception.
//!
//! The [`OfflineWorker`] reacts to the three lifecycle events the host
//! raises: install (populate the versioned store from the manifest),
//! activate (remove every other store), and fetch (cache-first with network
//! fallback and, failing that, the offline page). Each handler is an async
//! function whose future the host awaits before considering the event
//! handled.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use parishkit_net::{Fetcher, NetError, Request, Response};

use crate::cache::{CacheEntry, CacheStorage};
use crate::manifest::Manifest;
use crate::{CacheName, HostSignal, SwError, WorkerState};

/// Which stores a fetch-time cache lookup may search.
///
/// `AnyStore` searches every store, so an entry in a stale, not-yet-deleted
/// store can still satisfy a match during a version rollover. `CurrentStore`
/// scopes every match to the running version's store and never serves from a
/// store that activation is about to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupScope {
    #[default]
    CurrentStore,
    AnyStore,
}

/// Worker configuration, injected at construction.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Application identifier, the cache name prefix.
    pub app_id: String,
    /// Version tag baked into this worker's cache name.
    pub version: u32,
    /// The origin this worker serves.
    pub origin: Url,
    /// Assets cached at install time.
    pub manifest: Manifest,
    /// Cache lookup scoping.
    pub lookup_scope: LookupScope,
}

impl WorkerConfig {
    pub fn new(app_id: impl Into<String>, version: u32, origin: Url, manifest: Manifest) -> Self {
        Self {
            app_id: app_id.into(),
            version,
            origin,
            manifest,
            lookup_scope: LookupScope::default(),
        }
    }

    pub fn with_lookup_scope(mut self, scope: LookupScope) -> Self {
        self.lookup_scope = scope;
        self
    }

    /// The cache store name for this configuration.
    pub fn cache_name(&self) -> CacheName {
        CacheName::new(&self.app_id, self.version)
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Direct cache hit; no network access occurred.
    Cache,
    /// Live network response, passed through verbatim.
    Network,
    /// The cached offline fallback page.
    OfflineFallback,
}

/// A response handed back to the host, with its provenance.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: Response,
    pub served_from: ServedFrom,
}

/// The offline cache worker.
///
/// One instance per deployed version. The store registry is shared across
/// instances (and client contexts); the fetch path never writes to it, so
/// reads take the lock shared and there is no write contention outside
/// install and activate.
pub struct OfflineWorker {
    config: WorkerConfig,
    cache_name: CacheName,
    storage: Arc<RwLock<CacheStorage>>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<WorkerState>,
    signal_tx: mpsc::UnboundedSender<HostSignal>,
}

impl OfflineWorker {
    /// Create a worker and the receiver for its host control signals.
    pub fn new(
        config: WorkerConfig,
        storage: Arc<RwLock<CacheStorage>>,
        fetcher: Arc<dyn Fetcher>,
    ) -> (Self, mpsc::UnboundedReceiver<HostSignal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let cache_name = config.cache_name();

        (
            Self {
                config,
                cache_name,
                storage,
                fetcher,
                state: RwLock::new(WorkerState::Parsed),
                signal_tx,
            },
            signal_rx,
        )
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// This worker's cache store name.
    pub fn cache_name(&self) -> &CacheName {
        &self.cache_name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Handle the install event: populate this version's store from the
    /// manifest as one all-or-nothing batch.
    ///
    /// Every manifest URL is fetched concurrently; responses are committed
    /// to the store only once the entire batch has succeeded. On any failure
    /// the store is left unpopulated, the worker returns to `Parsed`, and
    /// the error propagates for the host to retry. On success the worker
    /// requests skip-waiting.
    pub async fn install(&self) -> Result<(), SwError> {
        self.transition(WorkerState::Parsed, WorkerState::Installing, "install")
            .await?;

        info!(cache = %self.cache_name, assets = self.config.manifest.len(), "installing");
        self.storage.write().await.open(self.cache_name.as_str());

        let fetches = self.config.manifest.paths().iter().map(|path| {
            let url = resolve(&self.config.origin, path);
            async move {
                let request = Request::get(url?);
                match self.fetcher.fetch(&request).await {
                    Ok(response) if response.ok() => Ok((path.as_str(), response)),
                    Ok(response) => Err(SwError::InstallFailed {
                        path: path.clone(),
                        source: NetError::RequestFailed(format!(
                            "unexpected status {}",
                            response.status
                        )),
                    }),
                    Err(source) => Err(SwError::InstallFailed {
                        path: path.clone(),
                        source,
                    }),
                }
            }
        });

        let fetched = match try_join_all(fetches).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(cache = %self.cache_name, error = %e, "install failed");
                self.set_state(WorkerState::Parsed).await;
                return Err(e);
            }
        };

        let commit = {
            let mut storage = self.storage.write().await;
            let cache = storage.open(self.cache_name.as_str());
            for (path, response) in fetched {
                cache.insert(CacheEntry::from_response(path, &response));
            }
            storage.commit(self.cache_name.as_str())
        };
        if let Err(e) = commit {
            warn!(cache = %self.cache_name, error = %e, "install snapshot failed");
            self.set_state(WorkerState::Parsed).await;
            return Err(e);
        }

        self.set_state(WorkerState::Installed).await;
        let _ = self.signal_tx.send(HostSignal::SkipWaiting);
        info!(cache = %self.cache_name, "installed");
        Ok(())
    }

    /// Handle the activate event: remove every store except this version's.
    ///
    /// Deletions are issued as one concurrent batch and individual failures
    /// are tolerated; a store that fails to delete stays behind until a
    /// later activation removes it. On completion the worker requests
    /// control of open clients.
    pub async fn activate(&self) -> Result<(), SwError> {
        self.transition(WorkerState::Installed, WorkerState::Activating, "activate")
            .await?;

        let stale: Vec<String> = {
            let storage = self.storage.read().await;
            storage
                .names()
                .into_iter()
                .filter(|name| name != self.cache_name.as_str())
                .collect()
        };

        let deletions = join_all(stale.iter().map(|name| {
            let storage = Arc::clone(&self.storage);
            async move { (name, storage.write().await.delete(name)) }
        }))
        .await;

        for (name, result) in deletions {
            match result {
                Ok(true) => debug!(cache = %name, "removed stale cache"),
                Ok(false) => {}
                Err(e) => warn!(cache = %name, error = %e, "failed to remove stale cache"),
            }
        }

        self.set_state(WorkerState::Activated).await;
        let _ = self.signal_tx.send(HostSignal::ClaimClients);
        info!(cache = %self.cache_name, "activated");
        Ok(())
    }

    /// Handle a fetch event.
    ///
    /// Cache-first: a hit returns the stored response verbatim with no
    /// network access. On a miss the request goes to the network and the
    /// live response is returned verbatim, without being written back. If
    /// the network fails, the cached offline fallback page is served; if
    /// that too is missing, the network error propagates and the request
    /// fails like any other.
    ///
    /// Serving is allowed from the moment install completes: skip-waiting
    /// means fetches can arrive while activation is still in flight.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, SwError> {
        self.require_serving("handle_fetch").await?;

        if let Some(entry) = self.cache_lookup(request).await {
            debug!(url = %request.url, "cache hit");
            return Ok(FetchOutcome {
                response: entry.to_response(request.url.clone()),
                served_from: ServedFrom::Cache,
            });
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                debug!(url = %request.url, status = %response.status, "served from network");
                Ok(FetchOutcome {
                    response,
                    served_from: ServedFrom::Network,
                })
            }
            Err(net_err) => self.serve_offline_fallback(request, net_err).await,
        }
    }

    /// Look up a request in the cache. Only same-origin GET requests can
    /// match; identity is the root-relative path plus query.
    async fn cache_lookup(&self, request: &Request) -> Option<CacheEntry> {
        if !request.is_get() || !same_origin(&request.url, &self.config.origin) {
            return None;
        }

        let key = cache_key(&request.url);
        let storage = self.storage.read().await;
        match self.config.lookup_scope {
            LookupScope::CurrentStore => storage.lookup_in(self.cache_name.as_str(), &key),
            LookupScope::AnyStore => storage.lookup_any(&key),
        }
        .cloned()
    }

    async fn serve_offline_fallback(
        &self,
        request: &Request,
        net_err: NetError,
    ) -> Result<FetchOutcome, SwError> {
        let fallback = self.config.manifest.fallback();
        let entry = {
            let storage = self.storage.read().await;
            match self.config.lookup_scope {
                LookupScope::CurrentStore => storage.lookup_in(self.cache_name.as_str(), fallback),
                LookupScope::AnyStore => storage.lookup_any(fallback),
            }
            .cloned()
        };

        match entry {
            Some(entry) => {
                warn!(url = %request.url, error = %net_err, "network failed, serving offline page");
                let fallback_url = resolve(&self.config.origin, fallback)?;
                Ok(FetchOutcome {
                    response: entry.to_response(fallback_url),
                    served_from: ServedFrom::OfflineFallback,
                })
            }
            None => Err(SwError::Unreachable { source: net_err }),
        }
    }

    async fn transition(
        &self,
        from: WorkerState,
        to: WorkerState,
        operation: &'static str,
    ) -> Result<(), SwError> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(SwError::InvalidState {
                from: *state,
                operation,
            });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }

    async fn require_serving(&self, operation: &'static str) -> Result<(), SwError> {
        let state = *self.state.read().await;
        match state {
            WorkerState::Installed | WorkerState::Activating | WorkerState::Activated => Ok(()),
            _ => Err(SwError::InvalidState {
                from: state,
                operation,
            }),
        }
    }
}

/// Resolve a root-relative manifest path against the configured origin.
fn resolve(origin: &Url, path: &str) -> Result<Url, SwError> {
    origin
        .join(path)
        .map_err(|e| SwError::Manifest(format!("cannot resolve {path:?}: {e}")))
}

/// Request identity within a store: path plus query, method handled upstream.
fn cache_key(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn same_origin(url: &Url, origin: &Url) -> bool {
    url.scheme() == origin.scheme()
        && url.host_str() == origin.host_str()
        && url.port_or_known_default() == origin.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use hashbrown::HashMap;
    use http::{HeaderMap, Method, StatusCode};

    const ORIGIN: &str = "https://parish-mkw.example";

    /// Canned fetcher with a call counter and a connectivity switch.
    struct MockFetcher {
        stubs: HashMap<String, (u16, &'static [u8])>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                stubs: HashMap::new(),
                offline: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn stub(mut self, path: &str, status: u16, body: &'static [u8]) -> Self {
            self.stubs
                .insert(format!("{ORIGIN}{path}"), (status, body));
            self
        }

        fn stub_url(mut self, url: &str, status: u16, body: &'static [u8]) -> Self {
            self.stubs.insert(url.to_string(), (status, body));
            self
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(NetError::RequestFailed("network unreachable".into()));
            }
            let (status, body) = self
                .stubs
                .get(request.url.as_str())
                .copied()
                .unwrap_or((404, b"not found" as &[u8]));
            Ok(Response {
                url: request.url.clone(),
                status: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from_static(body),
            })
        }
    }

    fn origin() -> Url {
        Url::parse(ORIGIN).unwrap()
    }

    fn parish_manifest() -> Manifest {
        Manifest::new(
            [
                "/",
                "/static/images/church.png",
                "/static/css/style.css",
                "/static/js/main.js",
                "/static/offline.html",
            ],
            "/static/offline.html",
        )
        .unwrap()
    }

    fn stubbed_fetcher() -> MockFetcher {
        MockFetcher::new()
            .stub("/", 200, b"home")
            .stub("/static/images/church.png", 200, b"logo")
            .stub("/static/css/style.css", 200, b"styles")
            .stub("/static/js/main.js", 200, b"script")
            .stub("/static/offline.html", 200, b"offline page")
    }

    fn shared_storage() -> Arc<RwLock<CacheStorage>> {
        Arc::new(RwLock::new(CacheStorage::new()))
    }

    fn worker_on(
        storage: Arc<RwLock<CacheStorage>>,
        fetcher: Arc<MockFetcher>,
        version: u32,
        manifest: Manifest,
    ) -> (OfflineWorker, mpsc::UnboundedReceiver<HostSignal>) {
        let config = WorkerConfig::new("parish-mkw", version, origin(), manifest);
        OfflineWorker::new(config, storage, fetcher)
    }

    fn worker(fetcher: Arc<MockFetcher>) -> (OfflineWorker, mpsc::UnboundedReceiver<HostSignal>) {
        worker_on(shared_storage(), fetcher, 1, parish_manifest())
    }

    fn get(path: &str) -> Request {
        Request::get(origin().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_install_populates_manifest() {
        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, mut signals) = worker(Arc::clone(&fetcher));

        worker.install().await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Installed);
        assert_eq!(signals.try_recv().unwrap(), HostSignal::SkipWaiting);

        let storage = worker.storage.read().await;
        assert!(storage.has("parish-mkw-v1"));
        for path in worker.config().manifest.paths() {
            assert!(
                storage.lookup_in("parish-mkw-v1", path).is_some(),
                "missing entry for {path}"
            );
        }
        assert_eq!(storage.get("parish-mkw-v1").unwrap().len(), 5);
        assert_eq!(storage.names().len(), 1);
    }

    #[tokio::test]
    async fn test_install_fails_wholesale() {
        // One unreachable asset fails the whole batch.
        let fetcher = Arc::new(stubbed_fetcher().stub("/static/js/main.js", 500, b""));
        let (worker, mut signals) = worker(fetcher);

        let err = worker.install().await.unwrap_err();
        match err {
            SwError::InstallFailed { path, .. } => assert_eq!(path, "/static/js/main.js"),
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(worker.state().await, WorkerState::Parsed);
        assert!(signals.try_recv().is_err());

        let storage = worker.storage.read().await;
        let lookups = worker
            .config()
            .manifest
            .paths()
            .iter()
            .filter(|path| storage.lookup_in("parish-mkw-v1", path).is_some())
            .count();
        assert_eq!(lookups, 0, "no partial cache state after failed install");
    }

    #[tokio::test]
    async fn test_install_retries_after_network_recovery() {
        let fetcher = Arc::new(stubbed_fetcher());
        fetcher.set_offline(true);
        let (worker, _signals) = worker(Arc::clone(&fetcher));

        assert!(worker.install().await.is_err());
        assert_eq!(worker.state().await, WorkerState::Parsed);

        fetcher.set_offline(false);
        worker.install().await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_activate_removes_stale_stores() {
        let storage = shared_storage();
        storage.write().await.open("parish-mkw-v0");

        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, mut signals) =
            worker_on(Arc::clone(&storage), fetcher, 1, parish_manifest());

        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        assert_eq!(worker.state().await, WorkerState::Activated);
        assert_eq!(signals.try_recv().unwrap(), HostSignal::SkipWaiting);
        assert_eq!(signals.try_recv().unwrap(), HostSignal::ClaimClients);

        let storage = storage.read().await;
        assert_eq!(storage.names(), vec!["parish-mkw-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_version_upgrade_replaces_store() {
        let storage = shared_storage();
        let fetcher = Arc::new(stubbed_fetcher());

        let (v1, _s1) = worker_on(
            Arc::clone(&storage),
            Arc::clone(&fetcher),
            1,
            parish_manifest(),
        );
        v1.install().await.unwrap();
        v1.activate().await.unwrap();

        let v2_manifest = Manifest::new(["/", "/static/offline.html"], "/static/offline.html").unwrap();
        let (v2, _s2) = worker_on(Arc::clone(&storage), fetcher, 2, v2_manifest);
        v2.install().await.unwrap();

        {
            let storage = storage.read().await;
            let mut names = storage.names();
            names.sort();
            assert_eq!(names, vec!["parish-mkw-v1", "parish-mkw-v2"]);
        }

        v2.activate().await.unwrap();

        let storage = storage.read().await;
        assert_eq!(storage.names(), vec!["parish-mkw-v2".to_string()]);
        assert_eq!(storage.get("parish-mkw-v2").unwrap().len(), 2);
        assert!(storage.lookup_in("parish-mkw-v2", "/").is_some());
        assert!(storage.lookup_in("parish-mkw-v2", "/static/offline.html").is_some());
        assert!(storage.lookup_in("parish-mkw-v2", "/static/css/style.css").is_none());
    }

    #[tokio::test]
    async fn test_fetch_served_from_cache_without_network() {
        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, _signals) = worker(Arc::clone(&fetcher));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let calls_before = fetcher.calls();
        let outcome = worker.handle_fetch(&get("/static/css/style.css")).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Cache);
        assert_eq!(outcome.response.body, Bytes::from_static(b"styles"));
        assert_eq!(fetcher.calls(), calls_before, "cache hit must not touch the network");
    }

    #[tokio::test]
    async fn test_fetch_miss_goes_to_network_and_is_not_cached() {
        let fetcher = Arc::new(stubbed_fetcher().stub("/dynamic/page", 200, b"fresh"));
        let (worker, _signals) = worker(Arc::clone(&fetcher));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let outcome = worker.handle_fetch(&get("/dynamic/page")).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Network);
        assert_eq!(outcome.response.body, Bytes::from_static(b"fresh"));

        // The fetch path never writes back to the cache.
        let storage = worker.storage.read().await;
        assert!(storage.lookup_in("parish-mkw-v1", "/dynamic/page").is_none());
    }

    #[tokio::test]
    async fn test_fetch_offline_serves_fallback_page() {
        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, _signals) = worker(Arc::clone(&fetcher));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        fetcher.set_offline(true);
        let outcome = worker.handle_fetch(&get("/dynamic/page")).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::OfflineFallback);
        assert_eq!(outcome.response.body, Bytes::from_static(b"offline page"));
    }

    #[tokio::test]
    async fn test_fetch_offline_cached_asset_still_served() {
        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, _signals) = worker(Arc::clone(&fetcher));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        fetcher.set_offline(true);
        let calls_before = fetcher.calls();
        let outcome = worker.handle_fetch(&get("/static/css/style.css")).await.unwrap();

        assert_eq!(outcome.served_from, ServedFrom::Cache);
        assert_eq!(outcome.response.body, Bytes::from_static(b"styles"));
        assert_eq!(fetcher.calls(), calls_before);
    }

    #[tokio::test]
    async fn test_fetch_fallback_missing_propagates_error() {
        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, _signals) = worker(Arc::clone(&fetcher));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        // Simulate host-side eviction of the whole store.
        worker.storage.write().await.delete("parish-mkw-v1").unwrap();
        fetcher.set_offline(true);

        let err = worker.handle_fetch(&get("/dynamic/page")).await.unwrap_err();
        assert!(matches!(err, SwError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_non_get_skips_cache_but_gets_fallback() {
        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, _signals) = worker(Arc::clone(&fetcher));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        // Online: a POST to a cached path still goes to the network.
        let post = Request::with_method(Method::POST, origin().join("/static/css/style.css").unwrap());
        let calls_before = fetcher.calls();
        let outcome = worker.handle_fetch(&post).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Network);
        assert_eq!(fetcher.calls(), calls_before + 1);

        // Offline: the failed POST is answered with the offline page.
        fetcher.set_offline(true);
        let outcome = worker.handle_fetch(&post).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::OfflineFallback);
    }

    #[tokio::test]
    async fn test_cross_origin_not_served_from_cache() {
        let fetcher = Arc::new(
            stubbed_fetcher().stub_url("https://other.example/static/css/style.css", 200, b"foreign"),
        );
        let (worker, _signals) = worker(Arc::clone(&fetcher));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let request = Request::get(Url::parse("https://other.example/static/css/style.css").unwrap());
        let outcome = worker.handle_fetch(&request).await.unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Network);
        assert_eq!(outcome.response.body, Bytes::from_static(b"foreign"));
    }

    #[tokio::test]
    async fn test_lookup_scope_across_version_rollover() {
        let storage = shared_storage();
        let fetcher = Arc::new(stubbed_fetcher());

        let (v1, _s1) = worker_on(
            Arc::clone(&storage),
            Arc::clone(&fetcher),
            1,
            parish_manifest(),
        );
        v1.install().await.unwrap();
        v1.activate().await.unwrap();

        // v2 drops the church logo from its manifest and has installed but
        // not yet activated, so the v1 store still exists.
        let v2_manifest = Manifest::new(["/", "/static/offline.html"], "/static/offline.html").unwrap();
        let strict_config = WorkerConfig::new("parish-mkw", 2, origin(), v2_manifest.clone());
        let loose_config = WorkerConfig::new("parish-mkw", 2, origin(), v2_manifest)
            .with_lookup_scope(LookupScope::AnyStore);

        let (strict, _) = OfflineWorker::new(
            strict_config,
            Arc::clone(&storage),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        );
        strict.install().await.unwrap();
        fetcher.set_offline(true);

        // Scoped lookup misses the logo and falls back to the offline page.
        let outcome = strict
            .handle_fetch(&get("/static/images/church.png"))
            .await
            .unwrap();
        assert_eq!(outcome.served_from, ServedFrom::OfflineFallback);

        // The loose lookup is satisfied by the stale v1 store.
        let (loose, _) = OfflineWorker::new(loose_config, storage, fetcher);
        loose.set_state(WorkerState::Installed).await;
        let outcome = loose
            .handle_fetch(&get("/static/images/church.png"))
            .await
            .unwrap();
        assert_eq!(outcome.served_from, ServedFrom::Cache);
        assert_eq!(outcome.response.body, Bytes::from_static(b"logo"));
    }

    #[tokio::test]
    async fn test_lifecycle_misuse_is_rejected() {
        let fetcher = Arc::new(stubbed_fetcher());
        let (worker, _signals) = worker(fetcher);

        assert!(matches!(
            worker.activate().await,
            Err(SwError::InvalidState { .. })
        ));
        assert!(matches!(
            worker.handle_fetch(&get("/")).await,
            Err(SwError::InvalidState { .. })
        ));

        worker.install().await.unwrap();
        assert!(matches!(
            worker.install().await,
            Err(SwError::InvalidState { .. })
        ));
    }
}
