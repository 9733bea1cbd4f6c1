//! Generation management: the host side of install, activate and page control.
//!
//! A [`Registration`] holds up to three generations at once:
//!
//! - `installing`: install handler running
//! - `waiting`: installed, held back while old pages still use the active one
//! - `active`: serving fetches for the pages it controls
//!
//! A waiting generation activates when nothing is active, when it has asked
//! to skip waiting, or when no open page is controlled by the active one.
//! The slot lock is never held while a handler runs; handlers call back
//! through [`WorkerScope`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::Error;
use crate::exchange::{Request, RequestMode, Response};
use crate::interceptor::{Command, FetchOutcome, Interceptor, Served, WorkerScope};
use crate::network::Network;

/// Identifier of an open page.
pub type ClientId = u64;

/// Lifecycle state of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

struct Worker {
    interceptor: Arc<Interceptor>,
    state: WorkerState,
    skip_waiting: bool,
}

impl Worker {
    fn new(interceptor: Arc<Interceptor>) -> Self {
        Self { interceptor, state: WorkerState::Installing, skip_waiting: false }
    }

    fn version(&self) -> &str {
        self.interceptor.version()
    }

    fn status(&self) -> WorkerStatus {
        WorkerStatus {
            version: self.version().to_string(),
            cache_name: self.interceptor.cache_name().to_string(),
            state: self.state,
        }
    }
}

#[derive(Default)]
struct Slots {
    installing: Option<Worker>,
    waiting: Option<Worker>,
    active: Option<Worker>,
    /// Open pages and the version controlling each, if any.
    clients: BTreeMap<ClientId, Option<String>>,
    next_client: ClientId,
    redundant: Vec<String>,
}

impl Slots {
    fn retire(&mut self, mut worker: Worker) {
        tracing::info!(version = %worker.version(), "generation redundant");
        worker.state = WorkerState::Redundant;
        self.redundant.push(worker.version().to_string());
    }

    fn active_in_use(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| self.clients.values().any(|c| c.as_deref() == Some(active.version())))
    }
}

/// Snapshot of one generation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkerStatus {
    pub version: String,
    pub cache_name: String,
    pub state: WorkerState,
}

/// Snapshot of one open page.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ClientStatus {
    pub id: ClientId,
    pub controller: Option<String>,
}

/// Snapshot of the whole registration.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RegistrationStatus {
    pub installing: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    pub active: Option<WorkerStatus>,
    pub clients: Vec<ClientStatus>,
    pub redundant: Vec<String>,
}

/// Result of dispatching a page request.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Went straight to the network: no controller, or the controller passed.
    Network(Response),
    /// Served by a generation's fetch handler.
    Intercepted { version: String, served: Served },
}

impl Dispatch {
    pub fn response(&self) -> &Response {
        match self {
            Dispatch::Network(response) => response,
            Dispatch::Intercepted { served, .. } => &served.response,
        }
    }
}

/// Host-side generation management for one controlled origin.
pub struct Registration {
    slots: Mutex<Slots>,
    network: Arc<dyn Network>,
}

/// Handle a generation uses to reach the registration.
struct Scope<'a> {
    registration: &'a Registration,
    version: String,
}

#[async_trait]
impl WorkerScope for Scope<'_> {
    async fn skip_waiting(&self) -> Result<(), Error> {
        self.registration.skip_waiting(&self.version).await
    }

    async fn claim_clients(&self) -> Result<(), Error> {
        self.registration.claim(&self.version).await;
        Ok(())
    }
}

impl Registration {
    /// The network is used for requests no generation handles.
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self { slots: Mutex::new(Slots::default()), network }
    }

    fn scope(&self, version: &str) -> Scope<'_> {
        Scope { registration: self, version: version.to_string() }
    }

    /// Install a generation, then activate it if the rules allow.
    ///
    /// A failed install leaves the current active generation untouched and
    /// marks the new one redundant. Re-installing the waiting or active
    /// version is a no-op.
    pub async fn install(&self, interceptor: Arc<Interceptor>) -> Result<(), Error> {
        let version = interceptor.version().to_string();
        {
            let mut slots = self.slots.lock().await;
            let known = [&slots.waiting, &slots.active]
                .into_iter()
                .flatten()
                .any(|w| w.version() == version);
            if known {
                tracing::debug!(%version, "generation already installed");
                return Ok(());
            }
            if let Some(previous) = slots.installing.replace(Worker::new(Arc::clone(&interceptor))) {
                slots.retire(previous);
            }
        }

        let result = interceptor.install(&self.scope(&version)).await;

        {
            let mut slots = self.slots.lock().await;
            let Some(mut worker) = slots.installing.take_if(|w| w.version() == version) else {
                tracing::debug!(%version, "install superseded");
                return result;
            };

            if let Err(err) = result {
                slots.retire(worker);
                return Err(err);
            }

            worker.state = WorkerState::Installed;
            tracing::info!(%version, "installed");
            if let Some(previous) = slots.waiting.replace(worker) {
                slots.retire(previous);
            }
        }

        self.try_activate().await
    }

    /// Flag a generation to activate without waiting for old pages.
    pub async fn skip_waiting(&self, version: &str) -> Result<(), Error> {
        {
            let mut guard = self.slots.lock().await;
            let slots = &mut *guard;
            for worker in slots.installing.iter_mut().chain(slots.waiting.iter_mut()) {
                if worker.version() == version {
                    worker.skip_waiting = true;
                }
            }
        }
        self.try_activate().await
    }

    /// Activate the waiting generation while the rules allow it.
    async fn try_activate(&self) -> Result<(), Error> {
        loop {
            let interceptor = {
                let mut slots = self.slots.lock().await;
                if slots.active.as_ref().is_some_and(|a| a.state == WorkerState::Activating) {
                    return Ok(());
                }
                let ready = match &slots.waiting {
                    Some(waiting) => slots.active.is_none() || waiting.skip_waiting || !slots.active_in_use(),
                    None => false,
                };
                if !ready {
                    return Ok(());
                }
                let Some(mut incoming) = slots.waiting.take() else {
                    return Ok(());
                };
                if let Some(outgoing) = slots.active.take() {
                    slots.retire(outgoing);
                }
                incoming.state = WorkerState::Activating;
                let interceptor = Arc::clone(&incoming.interceptor);
                slots.active = Some(incoming);
                interceptor
            };

            let version = interceptor.version().to_string();
            let result = interceptor.activate(&self.scope(&version)).await;

            {
                let mut slots = self.slots.lock().await;
                if let Some(active) = slots.active.as_mut().filter(|a| a.version() == version) {
                    active.state = WorkerState::Activated;
                }
            }

            if let Err(err) = result {
                tracing::warn!(%version, error = %err, "activate handler failed");
                return Err(err);
            }
        }
    }

    /// Make every open page controlled by `version`, if it is the active generation.
    async fn claim(&self, version: &str) {
        let mut slots = self.slots.lock().await;
        if slots.active.as_ref().is_none_or(|a| a.version() != version) {
            return;
        }
        for controller in slots.clients.values_mut() {
            *controller = Some(version.to_string());
        }
        tracing::debug!(%version, clients = slots.clients.len(), "claimed clients");
    }

    /// Open a page. It is controlled by the active generation, if any.
    pub async fn open_client(&self) -> ClientId {
        let mut slots = self.slots.lock().await;
        let id = slots.next_client;
        slots.next_client += 1;
        let controller = slots.active.as_ref().map(|a| a.version().to_string());
        slots.clients.insert(id, controller);
        id
    }

    /// Close a page; this may let a waiting generation activate.
    pub async fn close_client(&self, id: ClientId) -> Result<bool, Error> {
        let removed = self.slots.lock().await.clients.remove(&id).is_some();
        if removed {
            self.try_activate().await?;
        }
        Ok(removed)
    }

    /// Version controlling a page, if any.
    pub async fn controller_of(&self, id: ClientId) -> Option<String> {
        self.slots.lock().await.clients.get(&id).cloned().flatten()
    }

    /// Deliver a page message to the waiting generation.
    pub async fn post_message(&self, payload: &serde_json::Value) -> Result<Option<Command>, Error> {
        let waiting = self.slots.lock().await.waiting.as_ref().map(|w| Arc::clone(&w.interceptor));
        let Some(interceptor) = waiting else {
            tracing::debug!("no waiting generation; message dropped");
            return Ok(None);
        };
        interceptor.handle_message(payload, &self.scope(interceptor.version())).await
    }

    /// Dispatch a page request.
    ///
    /// Navigations go to the active generation; other requests go to the
    /// page's controller. Anything unhandled goes to the network.
    pub async fn fetch(&self, client: Option<ClientId>, request: &Request) -> Result<Dispatch, Error> {
        let handler = {
            let slots = self.slots.lock().await;
            let controller = match client {
                _ if request.mode == RequestMode::Navigate => slots.active.as_ref().map(|a| a.version().to_string()),
                Some(id) => slots.clients.get(&id).cloned().flatten(),
                None => None,
            };
            slots
                .active
                .as_ref()
                .filter(|a| controller.as_deref() == Some(a.version()))
                .map(|a| Arc::clone(&a.interceptor))
        };

        if let Some(interceptor) = handler {
            if let FetchOutcome::Respond(served) = interceptor.handle_fetch(request).await? {
                return Ok(Dispatch::Intercepted { version: interceptor.version().to_string(), served });
            }
        }

        Ok(Dispatch::Network(self.network.fetch(request).await?))
    }

    /// The active generation's handlers.
    pub async fn active(&self) -> Option<Arc<Interceptor>> {
        self.slots.lock().await.active.as_ref().map(|a| Arc::clone(&a.interceptor))
    }

    pub async fn status(&self) -> RegistrationStatus {
        let slots = self.slots.lock().await;
        RegistrationStatus {
            installing: slots.installing.as_ref().map(Worker::status),
            waiting: slots.waiting.as_ref().map(Worker::status),
            active: slots.active.as_ref().map(Worker::status),
            clients: slots
                .clients
                .iter()
                .map(|(id, controller)| ClientStatus { id: *id, controller: controller.clone() })
                .collect(),
            redundant: slots.redundant.clone(),
        }
    }
}
