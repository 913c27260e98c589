//! Network access over HTTP.

use async_trait::async_trait;
use portal_core::ports::Network;
use portal_core::{Error, Request, RequestMode, Response, ResponseType, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("portal-offline/", env!("CARGO_PKG_VERSION"));

/// [`Network`] backed by a `reqwest` client.
///
/// Response types are assigned relative to the portal origin: same-origin
/// responses are basic, cross-origin `no-cors` responses are opaque and other
/// cross-origin responses are CORS.
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Url,
}

impl HttpNetwork {
    pub fn new(origin: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn response_type(&self, request: &Request, final_url: &Url) -> ResponseType {
        if final_url.origin() == self.origin.origin() {
            ResponseType::Basic
        } else if request.mode == RequestMode::NoCors {
            ResponseType::Opaque
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::Internal(e.to_string()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", request.url, e)))?;

        let status = res.status().as_u16();
        let final_url = res.url().clone();
        let mut response = Response::new(status, Vec::new())
            .with_kind(self.response_type(request, &final_url))
            .with_url(final_url);
        for (name, value) in res.headers() {
            if let Ok(value) = value.to_str() {
                response.headers.insert(name.as_str(), value);
            }
        }

        response.body = res
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", request.url, e)))?
            .to_vec();

        debug!(
            method = %request.method,
            url = %request.url,
            status,
            bytes = response.body.len(),
            "Fetched"
        );
        Ok(response)
    }
}
