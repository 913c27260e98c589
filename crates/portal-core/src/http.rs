//! Request and response model seen by the offline cache manager.
//!
//! These mirror the parts of a browser fetch that the caching strategies care
//! about: method, URL, request mode and destination on the way in; status,
//! headers, body and response type on the way out.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// File extensions treated as image requests when no destination is known.
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif", "bmp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            other => Err(Error::Internal(format!("Unsupported HTTP method: {}", other))),
        }
    }
}

/// Fetch mode of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    SameOrigin,
    /// Cross-origin request whose response cannot be inspected.
    NoCors,
    #[default]
    Cors,
}

/// What the requested resource will be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
    #[default]
    Empty,
}

/// Case-insensitive header map. Names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identity under which a response is stored: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("{} {}", method, url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    #[serde(default)]
    pub mode: RequestMode,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub headers: Headers,
}

impl Request {
    /// A plain `GET` request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: Headers::new(),
        }
    }

    /// Parse a URL and build a request for it.
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        Ok(Self::get(url).with_method(method))
    }

    /// A top-level page navigation.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the request is for an image, by destination or by file extension.
    pub fn is_image(&self) -> bool {
        if self.destination == Destination::Image {
            return true;
        }
        let Some(last) = self.url.path_segments().and_then(|s| s.last()) else {
            return false;
        };
        last.rsplit_once('.')
            .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method, &self.url)
    }
}

/// How a response relates to the page that asked for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response with readable status and body.
    Cors,
    /// Cross-origin response whose status cannot be verified.
    Opaque,
    /// Built locally by the cache manager, never seen on the wire.
    Synthetic,
}

/// A response returned to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Vec<u8>,
    #[serde(default)]
    pub kind: ResponseType,
    #[serde(default)]
    pub url: Option<Url>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
            kind: ResponseType::Basic,
            url: None,
        }
    }

    /// A locally built JSON response.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status, body)
            .with_header("content-type", "application/json")
            .with_kind(ResponseType::Synthetic))
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_kind(mut self, kind: ResponseType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Status in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_drops_fragment() {
        let url = Url::parse("https://portal.example/index.html#courses").unwrap();
        let key = CacheKey::new(Method::Get, &url);
        assert_eq!(key.as_str(), "GET https://portal.example/index.html");
    }

    #[test]
    fn test_cache_key_keeps_query() {
        let req = Request::parse(Method::Get, "https://cdn.contentful.com/entries?content_type=location")
            .unwrap();
        assert_eq!(
            req.cache_key().as_str(),
            "GET https://cdn.contentful.com/entries?content_type=location"
        );
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn test_is_image_by_extension() {
        let req = Request::parse(Method::Get, "https://portal.example/img/logo.PNG").unwrap();
        assert!(req.is_image());

        let req = Request::parse(Method::Get, "https://portal.example/img/").unwrap();
        assert!(!req.is_image());
    }

    #[test]
    fn test_is_image_by_destination() {
        let req = Request::parse(Method::Get, "https://portal.example/avatar")
            .unwrap()
            .with_destination(Destination::Image);
        assert!(req.is_image());
    }

    #[test]
    fn test_headers_case_insensitive() {
        let resp = Response::new(200, "ok").with_header("Content-Type", "text/plain");
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(resp.headers.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn test_json_response_is_synthetic() {
        let resp = Response::json(503, &serde_json::json!({"error": "x"})).unwrap();
        assert_eq!(resp.kind, ResponseType::Synthetic);
        assert_eq!(resp.content_type(), Some("application/json"));
        assert!(!resp.is_ok());
    }
}
