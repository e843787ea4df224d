//! Offline cache router
//!
//! Every request for the dashboard passes through [`OfflineRouter::handle`]:
//! - share-target uploads are parked in `shared-files` and redirected
//! - anything cached is served cache-first, then revalidated in the background
//! - misses go to the network and are cached best-effort
//! - network trouble falls back to the cached application shell
//!
//! Cache failures never reach the caller; they are logged and treated as
//! misses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::Method;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::{CacheEntry, CacheStorage, Region, request_key};
use crate::config::Config;
use crate::error::{CacheError, FetchError};
use crate::fetch::{Fetcher, Request, Response};

pub mod classify;
pub mod control;
pub mod install;
pub mod multipart;
pub mod revalidate;
pub mod share;

pub use classify::{RouteRules, UrlClass};
pub use control::{ControlHandle, ControlMessage, RouterEvent};
pub use revalidate::Revalidation;

/// Event fan-out capacity
const EVENT_CAPACITY: usize = 16;

/// Cache storage shared between the router, its mailbox and background tasks
pub(crate) type SharedStorage = Arc<Mutex<CacheStorage>>;

pub(crate) fn with_storage<T>(
    storage: &SharedStorage,
    f: impl FnOnce(&CacheStorage) -> Result<T, CacheError>,
) -> Result<T, CacheError> {
    let guard = storage.lock().map_err(|_| CacheError::Poisoned)?;
    f(&guard)
}

/// Where a routed response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Served from a cache region
    Cache(Region),
    /// Fetched live and stored into a region
    Stored(Region),
    /// Fetched live, not cached
    Network,
    /// Cached application shell standing in for a failed request
    Shell,
    /// Share-target handoff
    ShareTarget,
    /// Synthesized 404
    NotFound,
}

/// A routed response plus any background work it started
#[derive(Debug)]
pub struct Routed {
    pub response: Response,
    pub source: Source,
    /// Revalidation running after a cache hit
    pub revalidation: Option<JoinHandle<Revalidation>>,
}

impl Routed {
    pub(crate) fn new(response: Response, source: Source) -> Self {
        Self {
            response,
            source,
            revalidation: None,
        }
    }
}

/// Offline-capable request router
pub struct OfflineRouter<F: Fetcher> {
    fetcher: Arc<F>,
    storage: SharedStorage,
    rules: RouteRules,
    online: AtomicBool,
    share_keys: share::ShareKeys,
    events: broadcast::Sender<RouterEvent>,
}

impl<F: Fetcher + 'static> OfflineRouter<F> {
    /// Create a router over `storage`, reaching the network through `fetcher`
    pub fn new(fetcher: F, storage: CacheStorage, rules: RouteRules) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            fetcher: Arc::new(fetcher),
            storage: Arc::new(Mutex::new(storage)),
            rules,
            online: AtomicBool::new(true),
            share_keys: share::ShareKeys::default(),
            events,
        }
    }

    /// Create a router using the hosts from the configuration
    pub fn from_config(
        fetcher: F,
        storage: CacheStorage,
        config: &Config,
    ) -> crate::error::Result<Self> {
        let rules = RouteRules::new(
            config.origin_url()?,
            config.api_host()?,
            config.thumbnail_host.clone(),
        );
        Ok(Self::new(fetcher, storage, rules))
    }

    /// Record whether the client currently considers itself online
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Classification rules in use
    pub fn rules(&self) -> &RouteRules {
        &self.rules
    }

    /// Receive router notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    pub(crate) fn with_storage<T>(
        &self,
        f: impl FnOnce(&CacheStorage) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        with_storage(&self.storage, f)
    }

    /// Route one request.
    ///
    /// `Err` is returned only when nothing can answer: a network failure for
    /// an API, thumbnail or shared-file URL, or any URL while the shell is
    /// not cached.
    pub async fn handle(&self, request: Request) -> Result<Routed, FetchError> {
        let class = self.rules.classify(&request);

        if class == UrlClass::Upload {
            return Ok(self.handle_share_target(&request));
        }

        // Only GET is cacheable; HEAD and writes go straight through
        if request.method != Method::GET {
            let response = self.fetcher.fetch(&request).await?;
            return Ok(Routed::new(response, Source::Network));
        }

        let key = request_key(&request.url);

        if let Some(entry) = self.lookup(&key) {
            log::debug!("Cache hit: {} ({})", key, entry.region);
            let revalidation = self.should_revalidate(class).then(|| {
                tokio::spawn(revalidate::revalidate(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.storage),
                    request.clone(),
                    entry.clone(),
                ))
            });
            return Ok(Routed {
                response: entry.response,
                source: Source::Cache(entry.region),
                revalidation,
            });
        }

        log::debug!("Cache miss: {}", key);
        match self.fetcher.fetch(&request).await {
            Ok(response) => Ok(self.on_live_response(class, &key, response)),
            Err(err) => self.on_network_failure(class, &key, err),
        }
    }

    fn lookup(&self, key: &str) -> Option<CacheEntry> {
        match self.with_storage(|s| s.match_any(key)) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Cache lookup for {} failed: {}", key, e);
                None
            }
        }
    }

    fn should_revalidate(&self, class: UrlClass) -> bool {
        // Thumbnails age out on their own; shared files have no upstream copy
        !matches!(class, UrlClass::Thumbnail | UrlClass::SharedFile) && self.is_online()
    }

    fn on_live_response(&self, class: UrlClass, key: &str, response: Response) -> Routed {
        if response.is_opaque() || class == UrlClass::Api {
            return Routed::new(response, Source::Network);
        }

        if !response.is_ok() {
            return match class {
                UrlClass::SharedFile => Routed::new(Response::not_found(key), Source::NotFound),
                UrlClass::Thumbnail => Routed::new(response, Source::Network),
                _ => match self.shell() {
                    Some(shell) => {
                        log::debug!("HTTP {} for {}, serving shell", response.status, key);
                        Routed::new(shell, Source::Shell)
                    }
                    None => Routed::new(response, Source::Network),
                },
            };
        }

        let region = match class {
            UrlClass::Thumbnail => Region::PreviewIcons,
            UrlClass::SharedFile => return Routed::new(response, Source::Network),
            _ => Region::OfflineCache,
        };

        match self.with_storage(|s| s.put(region, key, &response)) {
            Ok(()) => Routed::new(response, Source::Stored(region)),
            Err(e) => {
                log::warn!("Failed to cache {}: {}", key, e);
                Routed::new(response, Source::Network)
            }
        }
    }

    fn on_network_failure(
        &self,
        class: UrlClass,
        key: &str,
        err: FetchError,
    ) -> Result<Routed, FetchError> {
        if matches!(
            class,
            UrlClass::Api | UrlClass::Thumbnail | UrlClass::SharedFile
        ) {
            return Err(err);
        }

        match self.shell() {
            Some(shell) => {
                log::debug!("Network failed for {} ({}), serving shell", key, err);
                Ok(Routed::new(shell, Source::Shell))
            }
            None => Err(err),
        }
    }

    fn shell(&self) -> Option<Response> {
        self.lookup(&request_key(&self.rules.shell_url()))
            .map(|entry| entry.response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::{MockFetcher, RequestMode};
    use tempfile::TempDir;
    use url::Url;

    pub(crate) fn test_router() -> (OfflineRouter<MockFetcher>, MockFetcher, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::open_at(dir.path()).unwrap();
        let fetcher = MockFetcher::new();
        let rules = RouteRules::new(
            Url::parse("https://dash.test").unwrap(),
            "api.dash.test",
            "thumbs.dash.test",
        );
        let router = OfflineRouter::new(fetcher.clone(), storage, rules);
        (router, fetcher, dir)
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn cache_shell(router: &OfflineRouter<MockFetcher>) {
        let shell = "https://dash.test/index.html";
        router
            .with_storage(|s| {
                s.put(
                    Region::OfflineCache,
                    shell,
                    &Response::new(shell, 200, "<shell>"),
                )
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_network_call() {
        let (router, fetcher, _dir) = test_router();
        router.set_online(false);
        let url = "https://dash.test/dashboard/files";
        router
            .with_storage(|s| {
                s.put(Region::OfflineCache, url, &Response::new(url, 200, "cached"))
            })
            .unwrap();

        let routed = router.handle(get(url)).await.unwrap();

        assert_eq!(routed.source, Source::Cache(Region::OfflineCache));
        assert_eq!(routed.response.body, b"cached");
        assert!(routed.revalidation.is_none());
        assert_eq!(fetcher.total_calls().await, 0);
    }

    #[tokio::test]
    async fn test_miss_stores_in_offline_cache() {
        let (router, fetcher, _dir) = test_router();
        let url = "https://dash.test/app.js";
        fetcher.respond(url, Response::new(url, 200, "js"));

        let first = router.handle(get(url)).await.unwrap();
        assert_eq!(first.source, Source::Stored(Region::OfflineCache));

        router.set_online(false);
        let second = router.handle(get(url)).await.unwrap();
        assert_eq!(second.source, Source::Cache(Region::OfflineCache));
        assert_eq!(fetcher.call_count(url).await, 1);
    }

    #[tokio::test]
    async fn test_head_is_never_cached() {
        let (router, fetcher, _dir) = test_router();
        let url = "https://dash.test/app.js";
        fetcher.respond(url, Response::new(url, 200, "js"));

        let mut head = get(url);
        head.method = Method::HEAD;
        let routed = router.handle(head).await.unwrap();
        assert_eq!(routed.source, Source::Network);
        assert!(router.with_storage(|s| s.match_any(url)).unwrap().is_none());

        // The next GET still reaches the network and caches the full body
        let routed = router.handle(get(url)).await.unwrap();
        assert_eq!(routed.source, Source::Stored(Region::OfflineCache));
        assert_eq!(routed.response.body, b"js");
        assert_eq!(fetcher.call_count(url).await, 2);
    }

    #[tokio::test]
    async fn test_thumbnail_goes_to_preview_region_without_revalidation() {
        let (router, fetcher, _dir) = test_router();
        let url = "https://thumbs.dash.test/abc.webp";
        fetcher.respond(url, Response::new(url, 200, "webp"));

        let first = router.handle(get(url)).await.unwrap();
        assert_eq!(first.source, Source::Stored(Region::PreviewIcons));

        let second = router.handle(get(url)).await.unwrap();
        assert_eq!(second.source, Source::Cache(Region::PreviewIcons));
        assert!(second.revalidation.is_none());
        assert_eq!(fetcher.call_count(url).await, 1);
    }

    #[tokio::test]
    async fn test_expired_thumbnail_is_fetched_again() {
        let (router, fetcher, _dir) = test_router();
        let url = "https://thumbs.dash.test/old.webp";
        fetcher.respond(url, Response::new(url, 200, "v1"));
        fetcher.respond(url, Response::new(url, 200, "v2"));
        router.handle(get(url)).await.unwrap();

        let key = request_key(&Url::parse(url).unwrap());
        router
            .with_storage(|s| {
                s.backdate(
                    Region::PreviewIcons,
                    &key,
                    std::time::Duration::from_secs(25 * 60 * 60),
                )
            })
            .unwrap();

        let routed = router.handle(get(url)).await.unwrap();
        assert_eq!(routed.source, Source::Stored(Region::PreviewIcons));
        assert_eq!(routed.response.body, b"v2");
        assert_eq!(fetcher.call_count(url).await, 2);

        let stored = router
            .with_storage(|s| s.get(Region::PreviewIcons, &key))
            .unwrap()
            .unwrap();
        assert_eq!(stored.response.body, b"v2");
    }

    #[tokio::test]
    async fn test_api_and_opaque_pass_through_uncached() {
        let (router, fetcher, _dir) = test_router();
        let api = "https://api.dash.test/users/@me";
        let cdn = "https://cdn.test/font.woff2";
        fetcher.respond(api, Response::new(api, 200, "{}"));
        fetcher.respond(cdn, Response::new(cdn, 0, "").opaque());

        let routed = router.handle(get(api)).await.unwrap();
        assert_eq!(routed.source, Source::Network);

        let routed = router
            .handle(get(cdn).with_mode(RequestMode::NoCors))
            .await
            .unwrap();
        assert_eq!(routed.source, Source::Network);

        assert!(router.with_storage(|s| s.match_any(api)).unwrap().is_none());
        assert!(router.with_storage(|s| s.match_any(cdn)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_failure_serves_shell_for_assets() {
        let (router, fetcher, _dir) = test_router();
        cache_shell(&router);
        let url = "https://dash.test/dashboard/domains";
        fetcher.fail(url);

        let routed = router.handle(get(url)).await.unwrap();
        assert_eq!(routed.source, Source::Shell);
        assert_eq!(routed.response.body, b"<shell>");
    }

    #[tokio::test]
    async fn test_network_failure_propagates_for_protected_classes() {
        let (router, fetcher, _dir) = test_router();
        cache_shell(&router);

        for url in [
            "https://api.dash.test/files",
            "https://thumbs.dash.test/x.webp",
            "https://dash.test/dashboard/shared/123",
        ] {
            fetcher.fail(url);
            let result = router.handle(get(url)).await;
            assert!(matches!(result, Err(FetchError::Network(_))), "{}", url);
        }
    }

    #[tokio::test]
    async fn test_network_failure_without_shell_propagates() {
        let (router, _fetcher, _dir) = test_router();
        let result = router.handle(get("https://dash.test/dashboard")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_not_ok_asset_falls_back_to_shell() {
        let (router, fetcher, _dir) = test_router();
        cache_shell(&router);
        let url = "https://dash.test/dashboard/admin";
        fetcher.respond(url, Response::new(url, 502, "bad gateway"));

        let routed = router.handle(get(url)).await.unwrap();
        assert_eq!(routed.source, Source::Shell);
        assert!(router
            .with_storage(|s| s.get(Region::OfflineCache, url))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_not_ok_shared_file_is_404() {
        let (router, fetcher, _dir) = test_router();
        cache_shell(&router);
        let url = "https://dash.test/dashboard/shared/99";
        fetcher.respond(url, Response::new(url, 500, "oops"));

        let routed = router.handle(get(url)).await.unwrap();
        assert_eq!(routed.source, Source::NotFound);
        assert_eq!(routed.response.status, 404);
    }

    #[tokio::test]
    async fn test_not_ok_api_passes_through() {
        let (router, fetcher, _dir) = test_router();
        cache_shell(&router);
        let url = "https://api.dash.test/files";
        fetcher.respond(url, Response::new(url, 401, "{}"));

        let routed = router.handle(get(url)).await.unwrap();
        assert_eq!(routed.source, Source::Network);
        assert_eq!(routed.response.status, 401);
    }

    #[tokio::test]
    async fn test_revalidation_runs_only_while_online() {
        let (router, fetcher, _dir) = test_router();
        let url = "https://dash.test/app.css";
        router
            .with_storage(|s| s.put(Region::OfflineCache, url, &Response::new(url, 200, "css")))
            .unwrap();
        fetcher.respond(url, Response::new(url, 200, "css"));

        router.set_online(false);
        assert!(router.handle(get(url)).await.unwrap().revalidation.is_none());

        router.set_online(true);
        let routed = router.handle(get(url)).await.unwrap();
        let outcome = routed.revalidation.unwrap().await.unwrap();
        assert_eq!(outcome, Revalidation::Skipped);
        assert_eq!(fetcher.call_count(url).await, 1);
    }

    #[tokio::test]
    async fn test_non_get_goes_straight_to_network() {
        let (router, fetcher, _dir) = test_router();
        let url = "https://dash.test/dashboard/settings";
        fetcher.respond(url, Response::new(url, 204, ""));

        let mut request = get(url);
        request.method = Method::PUT;
        let routed = router.handle(request).await.unwrap();

        assert_eq!(routed.source, Source::Network);
        assert!(router.with_storage(|s| s.match_any(url)).unwrap().is_none());
    }
}
