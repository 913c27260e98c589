//! Test fixtures for creating sample data.

use portal_core::{Destination, Method, Request, Response};
use portal_offline::OfflineConfig;
use serde_json::json;
use url::Url;

/// Origin the fixture portal is served from.
pub const ORIGIN: &str = "https://portal.test/";

pub const CMS_ENTRIES_URL: &str =
    "https://cdn.contentful.com/spaces/abc123/environments/master/entries?content_type=location";

pub const FONT_CSS_URL: &str = "https://fonts.googleapis.com/css2?family=Inter:wght@400;700";

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

/// Absolute URL of a path on the fixture origin.
pub fn site_url(path: &str) -> Url {
    origin().join(path).unwrap()
}

/// Factory for offline cache configurations.
pub struct ConfigFixture;

impl ConfigFixture {
    /// The default portal configuration for a version on the fixture origin.
    pub fn portal(version: &str) -> OfflineConfig {
        OfflineConfig::new(version, origin())
    }

    /// A small configuration with three same-origin assets and one CDN asset.
    pub fn small(version: &str) -> OfflineConfig {
        OfflineConfig::new(version, origin()).with_static_assets(vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/style.css".to_string(),
            "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css".to_string(),
        ])
    }
}

/// Factory for canned responses.
pub struct ResponseFixture;

impl ResponseFixture {
    pub fn html(title: &str) -> Response {
        Response::new(
            200,
            format!("<!doctype html><title>{}</title>", title),
        )
        .with_header("content-type", "text/html; charset=utf-8")
    }

    pub fn css() -> Response {
        Response::new(200, "body{margin:0}").with_header("content-type", "text/css")
    }

    pub fn png() -> Response {
        Response::new(200, vec![0x89, b'P', b'N', b'G']).with_header("content-type", "image/png")
    }

    /// A CMS entries listing with one location.
    pub fn cms_entries(name: &str) -> Response {
        let body = json!({
            "items": [{"fields": {"name": name}}],
            "total": 1
        });
        Response::new(200, body.to_string()).with_header("content-type", "application/json")
    }
}

/// Factory for page requests.
pub struct RequestFixture;

impl RequestFixture {
    pub fn get(url: &str) -> Request {
        Request::parse(Method::Get, url).unwrap()
    }

    pub fn post(url: &str) -> Request {
        Request::parse(Method::Post, url).unwrap()
    }

    pub fn navigate(path: &str) -> Request {
        Request::navigate(site_url(path))
    }

    pub fn image(url: &str) -> Request {
        Self::get(url).with_destination(Destination::Image)
    }
}
