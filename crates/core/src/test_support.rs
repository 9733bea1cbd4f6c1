//! In-process doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use crate::cache::{CacheDb, CacheStorage};
use crate::config::AppConfig;
use crate::exchange::{Request, Response};
use crate::interceptor::{Interceptor, WorkerScope};
use crate::network::Network;
use crate::Error;

pub(crate) const ORIGIN: &str = "http://localhost:3000";

/// A same-origin `GET` for `path`.
pub(crate) fn get(path: &str) -> Request {
    Request::get(Url::parse(ORIGIN).unwrap().join(path).unwrap())
}

/// Scripted network keyed by path, with an offline switch.
pub(crate) struct StubNetwork {
    routes: Mutex<HashMap<String, Response>>,
    hits: Mutex<HashMap<String, usize>>,
    online: AtomicBool,
}

impl Default for StubNetwork {
    fn default() -> Self {
        Self { routes: Mutex::default(), hits: Mutex::default(), online: AtomicBool::new(true) }
    }
}

impl StubNetwork {
    pub(crate) fn serve(&self, path: &str, response: Response) {
        self.routes.lock().unwrap().insert(path.to_string(), response);
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Fetch attempts for `path`, online or not.
    pub(crate) fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub(crate) fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let path = request.url.path().to_string();
        *self.hits.lock().unwrap().entry(path.clone()).or_default() += 1;

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        self.routes
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .ok_or_else(|| Error::Network(format!("connection refused: {}", request.url)))
    }
}

/// Scope that counts calls and can snapshot the store set at claim time.
#[derive(Default)]
pub(crate) struct RecordingScope {
    skip_waiting: AtomicUsize,
    claims: AtomicUsize,
    observed: Option<Arc<CacheDb>>,
    stores_at_claim: Mutex<Option<Vec<String>>>,
}

impl RecordingScope {
    pub(crate) fn observing(db: Arc<CacheDb>) -> Self {
        Self { observed: Some(db), ..Default::default() }
    }

    pub(crate) fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn claim_calls(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub(crate) fn stores_seen_at_claim(&self) -> Option<Vec<String>> {
        self.stores_at_claim.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerScope for RecordingScope {
    async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<(), Error> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        if let Some(db) = &self.observed {
            let names = db.keys().await?;
            *self.stores_at_claim.lock().unwrap() = Some(names);
        }
        Ok(())
    }
}

/// Store whose reads wait until [`GatedStore::release`]; everything else passes through.
pub(crate) struct GatedStore {
    inner: Arc<CacheDb>,
    gate: tokio::sync::Semaphore,
    reads: AtomicUsize,
}

impl GatedStore {
    pub(crate) fn new(inner: Arc<CacheDb>) -> Self {
        Self { inner, gate: tokio::sync::Semaphore::new(0), reads: AtomicUsize::new(0) }
    }

    /// Let held and future reads through.
    pub(crate) fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Reads that have started, held or not.
    pub(crate) fn reads_started(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStorage for GatedStore {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.inner.has(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete(name).await
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.inner.put(name, request, response).await
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.map_err(|e| Error::TaskFailed(e.to_string()))?;
        self.inner.match_request(name, request).await
    }
}

pub(crate) struct Fixture {
    pub(crate) db: Arc<CacheDb>,
    pub(crate) network: Arc<StubNetwork>,
    pub(crate) interceptor: Interceptor,
}

pub(crate) async fn fixture() -> Fixture {
    fixture_with(AppConfig::default()).await
}

pub(crate) async fn fixture_with(config: AppConfig) -> Fixture {
    let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let network = Arc::new(StubNetwork::default());
    let interceptor = Interceptor::new(&config, db.clone(), network.clone()).unwrap();
    Fixture { db, network, interceptor }
}
