//! Host-side registration of offline cache workers.
//!
//! A [`Registration`] plays the part the browser plays for a service worker:
//! it installs new versions, decides when a waiting version takes over,
//! tracks the pages (clients) under its scope and routes their fetches to the
//! active worker.

use crate::lifecycle::{ActivateOutcome, WorkerState};
use crate::messaging::MessageOutcome;
use crate::strategy::FetchOutcome;
use crate::worker::ServiceWorker;
use portal_core::ports::Network;
use portal_core::{ClientId, Request, Response, Result, WorkerId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

/// Observer for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub version: String,
    state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }
}

struct WorkerSlot {
    id: WorkerId,
    worker: Arc<dyn ServiceWorker>,
    state: watch::Sender<WorkerState>,
}

impl WorkerSlot {
    fn set_state(&self, state: WorkerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(worker = %self.id, version = %self.worker.version(), from = %previous, to = %state, "Worker state changed");
        }
    }

    fn version(&self) -> String {
        self.worker.version().to_string()
    }
}

#[derive(Default)]
struct Slots {
    installing: Option<WorkerSlot>,
    waiting: Option<WorkerSlot>,
    active: Option<WorkerSlot>,
    /// Open pages and the worker controlling each.
    clients: HashMap<ClientId, Option<WorkerId>>,
}

impl Slots {
    fn active_has_clients(&self) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        self.clients.values().any(|c| *c == Some(active.id))
    }

    fn intercepting(&self) -> Option<Arc<dyn ServiceWorker>> {
        self.active
            .as_ref()
            .filter(|slot| slot.state.borrow().can_intercept_fetch())
            .map(|slot| Arc::clone(&slot.worker))
    }
}

/// Workers registered for one scope.
pub struct Registration {
    scope: Url,
    network: Arc<dyn Network>,
    slots: Mutex<Slots>,
}

impl Registration {
    pub fn new(scope: Url, network: Arc<dyn Network>) -> Self {
        Self {
            scope,
            network,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Create a registration for `scope` and install its first worker.
    pub async fn register(
        scope: Url,
        network: Arc<dyn Network>,
        worker: Arc<dyn ServiceWorker>,
    ) -> Result<(Self, WorkerHandle)> {
        let registration = Self::new(scope, network);
        let handle = registration.update(worker).await?;
        Ok((registration, handle))
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    /// Whether a page at `url` is controlled by this registration.
    pub fn in_scope(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.scope.as_str())
    }

    /// Install a new worker version.
    ///
    /// On install failure the worker becomes redundant, the error is returned
    /// and the active worker keeps serving. On success the worker waits, or
    /// activates straight away when it asked to skip waiting, when nothing is
    /// active, or when no open page uses the active worker.
    pub async fn update(&self, worker: Arc<dyn ServiceWorker>) -> Result<WorkerHandle> {
        let id = WorkerId::new();
        let (state_tx, state_rx) = watch::channel(WorkerState::Installing);
        let handle = WorkerHandle {
            id,
            version: worker.version().to_string(),
            state: state_rx,
        };

        {
            let mut slots = self.slots.lock().await;
            let slot = WorkerSlot {
                id,
                worker: Arc::clone(&worker),
                state: state_tx,
            };
            if let Some(superseded) = slots.installing.replace(slot) {
                superseded.set_state(WorkerState::Redundant);
            }
        }

        info!(worker = %id, version = %handle.version, "Installing worker");
        let installed = worker.on_install().await;

        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.installing.take_if(|slot| slot.id == id) else {
            // A newer update replaced this one while it was installing.
            return Ok(handle);
        };

        let outcome = match installed {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(worker = %id, version = %handle.version, error = %e, "Install failed");
                slot.set_state(WorkerState::Redundant);
                return Err(e);
            }
        };

        info!(worker = %id, cached = outcome.cached, "Worker installed");
        slot.set_state(WorkerState::Waiting);
        if let Some(replaced) = slots.waiting.replace(slot) {
            replaced.set_state(WorkerState::Redundant);
        }

        let activate_now =
            outcome.skip_waiting || slots.active.is_none() || !slots.active_has_clients();
        drop(slots);

        if activate_now {
            self.activate_waiting().await;
        }
        Ok(handle)
    }

    /// Promote the waiting worker, retire the active one and run activation.
    ///
    /// Activation errors are logged; the worker becomes active regardless.
    async fn activate_waiting(&self) -> Option<ActivateOutcome> {
        let (worker, id) = {
            let mut slots = self.slots.lock().await;
            let next = slots.waiting.take()?;
            if let Some(retired) = slots.active.take() {
                info!(worker = %retired.id, version = %retired.version(), "Worker redundant");
                retired.set_state(WorkerState::Redundant);
            }
            let worker = Arc::clone(&next.worker);
            let id = next.id;
            slots.active = Some(next);
            (worker, id)
        };

        let activated = worker.on_activate().await;

        let mut slots = self.slots.lock().await;
        if let Some(active) = slots.active.as_ref().filter(|slot| slot.id == id) {
            active.set_state(WorkerState::Active);
        }

        match activated {
            Ok(outcome) => {
                if outcome.claim_clients {
                    for controller in slots.clients.values_mut() {
                        *controller = Some(id);
                    }
                }
                info!(
                    worker = %id,
                    deleted = outcome.deleted.len(),
                    clients = slots.clients.len(),
                    "Worker active"
                );
                Some(outcome)
            }
            Err(e) => {
                warn!(worker = %id, error = %e, "Activation failed");
                None
            }
        }
    }

    /// Deliver a page message to the waiting worker, or the active one if
    /// nothing is waiting.
    pub async fn post_message(&self, message: &Value) -> MessageOutcome {
        let target = {
            let slots = self.slots.lock().await;
            slots
                .waiting
                .as_ref()
                .or(slots.active.as_ref())
                .map(|slot| (Arc::clone(&slot.worker), slot.id))
        };
        let Some((worker, id)) = target else {
            return MessageOutcome::Ignored;
        };

        let outcome = worker.on_message(message).await;
        if outcome == MessageOutcome::SkipWaiting {
            let is_waiting = {
                let slots = self.slots.lock().await;
                slots.waiting.as_ref().map(|slot| slot.id) == Some(id)
            };
            if is_waiting {
                info!(worker = %id, "Skip waiting requested");
                self.activate_waiting().await;
            }
        }
        outcome
    }

    /// Open a page. Pages inside the scope are controlled by the active worker.
    pub async fn open_client(&self, page: &Url) -> ClientId {
        let id = ClientId::new();
        let mut slots = self.slots.lock().await;
        let controller = if self.in_scope(page) {
            slots.intercepting().and(slots.active.as_ref().map(|slot| slot.id))
        } else {
            None
        };
        slots.clients.insert(id, controller);
        debug!(client = %id, page = %page, "Client opened");
        id
    }

    /// Close a page. Once no page uses the active worker, a waiting worker takes over.
    pub async fn close_client(&self, client: ClientId) -> bool {
        let (removed, promote) = {
            let mut slots = self.slots.lock().await;
            let removed = slots.clients.remove(&client).is_some();
            let promote = slots.waiting.is_some() && !slots.active_has_clients();
            (removed, promote)
        };
        if promote {
            self.activate_waiting().await;
        }
        removed
    }

    /// Worker controlling a page, if any.
    pub async fn controller(&self, client: ClientId) -> Option<WorkerId> {
        self.slots.lock().await.clients.get(&client).copied().flatten()
    }

    /// Handle a fetch made by a page.
    ///
    /// Controlled pages go through the active worker; everything else, and
    /// requests the worker declines to intercept, go to the network.
    pub async fn fetch(&self, client: ClientId, request: &Request) -> Result<Response> {
        let worker = {
            let slots = self.slots.lock().await;
            match slots.clients.get(&client) {
                Some(Some(_)) => slots.intercepting(),
                _ => None,
            }
        };

        let Some(worker) = worker else {
            return self.network.fetch(request).await;
        };

        match worker.on_fetch(request).await {
            FetchOutcome::Passthrough => self.network.fetch(request).await,
            FetchOutcome::Respond { response, .. } => Ok(response),
            FetchOutcome::Failed(e) => Err(e),
        }
    }

    pub async fn installing_version(&self) -> Option<String> {
        self.slots.lock().await.installing.as_ref().map(WorkerSlot::version)
    }

    pub async fn waiting_version(&self) -> Option<String> {
        self.slots.lock().await.waiting.as_ref().map(WorkerSlot::version)
    }

    pub async fn active_version(&self) -> Option<String> {
        self.slots.lock().await.active.as_ref().map(WorkerSlot::version)
    }
}
