//! The request interceptor for one generation.
//!
//! An [`Interceptor`] owns the handlers a host invokes:
//!
//! - [`Interceptor::install`] pre-caches the static manifest, then asks to skip waiting.
//! - [`Interceptor::activate`] deletes other generations' stores, then claims open pages.
//! - [`Interceptor::handle_fetch`] routes and serves a request.
//! - [`Interceptor::handle_message`] reacts to page commands.
//!
//! Calls back into the host go through [`WorkerScope`].

pub mod classify;
pub mod cleanup;
pub mod command;
pub mod strategy;

use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tokio::task::JoinSet;
use url::Url;

pub use classify::{Classifier, Route, Strategy};
pub use cleanup::stale_stores;
pub use command::Command;
pub use strategy::{Served, Source};

use crate::Error;
use crate::cache::CacheStorage;
use crate::config::AppConfig;
use crate::exchange::{Request, Response, check_storable};
use crate::network::Network;

/// Host operations a generation may request.
#[async_trait]
pub trait WorkerScope: Send + Sync {
    /// Make this generation eligible for activation without waiting for old pages to close.
    async fn skip_waiting(&self) -> Result<(), Error>;

    /// Take control of every open page.
    async fn claim_clients(&self) -> Result<(), Error>;
}

/// What the fetch handler decided.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not handled; the host fetches from the network itself.
    Passthrough,
    Respond(Served),
}

/// One generation's handlers, bound to a store set and a network.
pub struct Interceptor {
    version: String,
    cache_prefix: String,
    cache_name: String,
    static_assets: Vec<Url>,
    skip_waiting_on_install: bool,
    classifier: Classifier,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    background: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("version", &self.version)
            .field("cache_name", &self.cache_name)
            .finish_non_exhaustive()
    }
}

impl Interceptor {
    /// Build the handlers for the generation named in `config`.
    pub fn new(config: &AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let classifier = Classifier::new(config)?;
        let static_assets = config
            .static_assets
            .iter()
            .map(|path| {
                classifier
                    .origin()
                    .join(path)
                    .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: config.version.clone(),
            cache_prefix: config.cache_prefix.clone(),
            cache_name: config.cache_name(),
            static_assets,
            skip_waiting_on_install: config.skip_waiting_on_install,
            classifier,
            storage,
            network,
            background: Mutex::new(JoinSet::new()),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the store this generation reads and writes.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Pre-cache every static resource, then signal skip-waiting (unless configured off).
    ///
    /// All resources are fetched before any is written; one failed fetch or
    /// non-2xx response fails the whole install.
    pub async fn install(&self, scope: &dyn WorkerScope) -> Result<(), Error> {
        tracing::info!(version = %self.version, cache = %self.cache_name, assets = self.static_assets.len(), "installing");

        self.storage.open(&self.cache_name).await?;

        let responses = try_join_all(self.static_assets.iter().map(|url| self.precache_fetch(url)))
            .await
            .inspect_err(|err| tracing::warn!(version = %self.version, error = %err, "install failed"))?;

        try_join_all(
            responses
                .iter()
                .map(|(request, response)| self.storage.put(&self.cache_name, request, response)),
        )
        .await?;

        if self.skip_waiting_on_install {
            scope.skip_waiting().await?;
        }
        Ok(())
    }

    async fn precache_fetch(&self, url: &Url) -> Result<(Request, Response), Error> {
        let request = Request::get(url.clone());
        let failed = |reason: String| Error::InstallFailed { resource: url.path().to_string(), reason };

        let response = self.network.fetch(&request).await.map_err(|e| failed(e.to_string()))?;
        if !response.is_ok() {
            return Err(failed(format!("status {}", response.status.as_u16())));
        }
        check_storable(&request, &response).map_err(|e| failed(e.to_string()))?;

        Ok((request, response))
    }

    /// Delete every other generation's store, then claim open pages.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self, scope: &dyn WorkerScope) -> Result<Vec<String>, Error> {
        let names = self.storage.keys().await?;
        let stale = stale_stores(&names, &self.cache_prefix, &self.cache_name);

        try_join_all(stale.iter().map(|name| async move {
            tracing::info!(cache = %name, "deleting old cache");
            self.storage.delete(name).await
        }))
        .await?;

        scope.claim_clients().await?;
        tracing::info!(version = %self.version, deleted = stale.len(), "activated");
        Ok(stale)
    }

    /// Route a request and, if it belongs to the controlled origin, serve it.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        match self.classifier.route(request) {
            Route::Passthrough => {
                tracing::debug!(url = %request.url, "cross-origin passthrough");
                Ok(FetchOutcome::Passthrough)
            }
            Route::Intercept(strategy) => self.execute(strategy, request).await.map(FetchOutcome::Respond),
        }
    }

    /// Act on a page message. Unrecognized payloads are ignored.
    pub async fn handle_message(
        &self, payload: &serde_json::Value, scope: &dyn WorkerScope,
    ) -> Result<Option<Command>, Error> {
        match Command::parse(payload) {
            Some(Command::SkipWaiting) => {
                tracing::info!(version = %self.version, "skip-waiting requested by page");
                scope.skip_waiting().await?;
                Ok(Some(Command::SkipWaiting))
            }
            None => {
                tracing::debug!(%payload, "ignoring unrecognized message");
                Ok(None)
            }
        }
    }

    /// Keep background work alive until [`Interceptor::settle`].
    fn track<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.background.lock().unwrap_or_else(|e| e.into_inner());
        // Reap finished revalidations so the set only holds live ones.
        while let Some(result) = set.try_join_next() {
            if let Err(err) = result {
                tracing::warn!(error = %err, "background task failed");
            }
        }
        set.spawn(task);
    }

    #[cfg(test)]
    pub(crate) fn background_len(&self) -> usize {
        self.background.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait for all background revalidations started so far. Returns how many finished.
    pub async fn settle(&self) -> usize {
        let mut pending = std::mem::take(&mut *self.background.lock().unwrap_or_else(|e| e.into_inner()));
        let mut finished = 0;
        while let Some(result) = pending.join_next().await {
            if let Err(err) = result {
                tracing::warn!(error = %err, "background task failed");
            }
            finished += 1;
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingScope, fixture, fixture_with, get};
    use serde_json::json;

    #[tokio::test]
    async fn test_install_precaches_and_skips_waiting() {
        let config = AppConfig { static_assets: vec!["/a.json".into(), "/b.svg".into()], ..Default::default() };
        let fx = fixture_with(config).await;
        fx.network.serve("/a.json", Response::ok("{}"));
        fx.network.serve("/b.svg", Response::ok("<svg/>"));
        let scope = RecordingScope::default();

        fx.interceptor.install(&scope).await.unwrap();

        let urls = fx.db.list_urls("shell-v2").await.unwrap();
        assert_eq!(urls, vec!["http://localhost:3000/a.json", "http://localhost:3000/b.svg"]);
        assert_eq!(scope.skip_waiting_calls(), 1);
    }

    #[tokio::test]
    async fn test_install_fails_on_network_error() {
        let config = AppConfig { static_assets: vec!["/a.json".into(), "/b.svg".into()], ..Default::default() };
        let fx = fixture_with(config).await;
        fx.network.serve("/a.json", Response::ok("{}"));
        let scope = RecordingScope::default();

        let err = fx.interceptor.install(&scope).await.unwrap_err();
        assert!(matches!(err, Error::InstallFailed { ref resource, .. } if resource == "/b.svg"));
        assert_eq!(scope.skip_waiting_calls(), 0);
        assert_eq!(fx.db.count_entries("shell-v2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_fails_on_error_status() {
        let config = AppConfig { static_assets: vec!["/a.json".into()], ..Default::default() };
        let fx = fixture_with(config).await;
        fx.network.serve("/a.json", Response::new(http::StatusCode::INTERNAL_SERVER_ERROR, "boom"));

        let err = fx.interceptor.install(&RecordingScope::default()).await.unwrap_err();
        assert!(err.to_string().contains("status 500"));
    }

    #[tokio::test]
    async fn test_install_can_leave_generation_waiting() {
        let config = AppConfig { static_assets: Vec::new(), skip_waiting_on_install: false, ..Default::default() };
        let fx = fixture_with(config).await;
        let scope = RecordingScope::default();
        fx.interceptor.install(&scope).await.unwrap();
        assert_eq!(scope.skip_waiting_calls(), 0);
    }

    #[tokio::test]
    async fn test_install_with_empty_manifest_creates_store() {
        let fx = fixture_with(AppConfig { static_assets: Vec::new(), ..Default::default() }).await;
        fx.interceptor.install(&RecordingScope::default()).await.unwrap();
        assert!(fx.db.has("shell-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_then_claims() {
        let fx = fixture().await;
        fx.db.put("shell-v1", &get("/"), &Response::ok("old")).await.unwrap();
        fx.db.open("shell-v2").await.unwrap();
        fx.db.open("thirdparty").await.unwrap();
        let scope = RecordingScope::default();

        let deleted = fx.interceptor.activate(&scope).await.unwrap();

        assert_eq!(deleted, vec!["shell-v1"]);
        assert_eq!(fx.db.keys().await.unwrap(), vec!["shell-v2", "thirdparty"]);
        assert_eq!(scope.claim_calls(), 1);
    }

    #[tokio::test]
    async fn test_activate_claims_after_deletion() {
        let fx = fixture().await;
        fx.db.open("shell-v1").await.unwrap();
        let scope = RecordingScope::observing(Arc::clone(&fx.db));

        fx.interceptor.activate(&scope).await.unwrap();

        assert_eq!(scope.stores_seen_at_claim(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_handle_fetch_passthrough_cross_origin() {
        let fx = fixture().await;
        let request = Request::get(Url::parse("https://fonts.example/inter.woff2").unwrap());
        let outcome = fx.interceptor.handle_fetch(&request).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough));
        assert_eq!(fx.network.total_hits(), 0);
    }

    #[tokio::test]
    async fn test_handle_fetch_routes_by_strategy() {
        let fx = fixture().await;
        fx.network.serve("/api/data", Response::ok("[]"));
        let outcome = fx.interceptor.handle_fetch(&get("/api/data")).await.unwrap();
        match outcome {
            FetchOutcome::Respond(served) => assert_eq!(served.strategy, Strategy::Api),
            FetchOutcome::Passthrough => panic!("same-origin request passed through"),
        }
    }

    #[tokio::test]
    async fn test_handle_message() {
        let fx = fixture().await;
        let scope = RecordingScope::default();

        let cmd = fx.interceptor.handle_message(&json!({"type": "SKIP_WAITING"}), &scope).await.unwrap();
        assert_eq!(cmd, Some(Command::SkipWaiting));
        assert_eq!(scope.skip_waiting_calls(), 1);

        let cmd = fx.interceptor.handle_message(&json!({"type": "PING"}), &scope).await.unwrap();
        assert_eq!(cmd, None);
        assert_eq!(scope.skip_waiting_calls(), 1);
    }

    #[tokio::test]
    async fn test_new_rejects_bad_origin() {
        let fx = fixture().await;
        let config = AppConfig { origin: "not-a-url".into(), ..Default::default() };
        let result = Interceptor::new(&config, Arc::clone(&fx.db) as Arc<dyn CacheStorage>, fx.network.clone());
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
