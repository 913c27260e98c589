//! Test helper functions and utilities.

use async_trait::async_trait;
use portal_core::ports::Network;
use portal_core::{Error, Request, RequestMode, Response, ResponseType, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use url::Url;

fn strip_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// In-process [`Network`] answering from a table of canned responses.
///
/// Unknown URLs get a `404`. The network can be switched offline as a whole
/// or made to fail for single URLs; every request is recorded. Response types
/// are assigned relative to `origin` the way `HttpNetwork` does.
pub struct ScriptedNetwork {
    origin: Url,
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedNetwork {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            routes: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer `url` with `response`.
    pub fn route(&self, url: &Url, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert(strip_fragment(url), response);
    }

    /// Answer `url` with a `200` carrying `body`.
    pub fn route_ok(&self, url: &Url, body: impl Into<Vec<u8>>) {
        self.route(url, Response::new(200, body));
    }

    /// Make requests for `url` fail at the transport level.
    pub fn fail(&self, url: &Url) {
        self.failing.lock().unwrap().insert(strip_fragment(url));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of requests that reached the network for `url`.
    pub fn fetch_count(&self, url: &Url) -> usize {
        let wanted = strip_fragment(url);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| strip_fragment(&r.url) == wanted)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn response_type(&self, request: &Request) -> ResponseType {
        if request.url.origin() == self.origin.origin() {
            ResponseType::Basic
        } else if request.mode == RequestMode::NoCors {
            ResponseType::Opaque
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());

        let key = strip_fragment(&request.url);
        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&key) {
            debug!(url = %request.url, "Scripted network refusing request");
            return Err(Error::Network(format!("{}: connection refused", request.url)));
        }

        let response = self
            .routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "Not Found"));
        debug!(method = %request.method, url = %request.url, status = response.status, "Scripted response");

        Ok(response
            .with_kind(self.response_type(request))
            .with_url(request.url.clone()))
    }
}
