//! Offline cache manager configuration.

use portal_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Configuration for one deployed version of the offline cache manager.
///
/// `version` names the cache generation. It must change on every deploy that
/// changes the static asset list or the caching strategies, otherwise stale
/// assets stay cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Cache generation name for this deploy.
    #[serde(default = "default_version")]
    pub version: String,
    /// Origin the portal is served from. Relative assets resolve against it.
    #[serde(default = "default_origin")]
    pub origin: Url,
    /// Host name of the CMS content-delivery API.
    #[serde(default = "default_cms_host")]
    pub cms_host: String,
    /// Resources pre-cached on install, as paths or absolute URLs.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,
    /// Regular expressions for URLs cached opportunistically.
    #[serde(default = "default_dynamic_patterns")]
    pub dynamic_patterns: Vec<String>,
    /// Document served for offline navigations.
    #[serde(default = "default_shell_document")]
    pub shell_document: String,
    /// Activate straight after a successful install.
    #[serde(default = "default_skip_waiting")]
    pub skip_waiting_on_install: bool,
    /// Content type of the blank offline image.
    #[serde(default = "default_image_placeholder")]
    pub image_placeholder_content_type: String,
}

fn default_version() -> String {
    "waterbear-portal-v1".to_string()
}

fn default_origin() -> Url {
    Url::parse("http://localhost:8080/").expect("default origin is a valid URL")
}

fn default_cms_host() -> String {
    "cdn.contentful.com".to_string()
}

fn default_static_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/style.css",
        "/script.js",
        "/env.js",
        "/site.webmanifest",
        "/favicon.ico",
        "/favicon-32x32.png",
        "/apple-touch-icon.png",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/js/bootstrap.bundle.min.js",
        "https://cdn.jsdelivr.net/npm/bootstrap-icons@1.11.3/font/bootstrap-icons.css",
        "https://unpkg.com/lucide@latest",
        "https://cdn.skypack.dev/motion",
        "https://waterbear.org.uk/wp-content/uploads/2022/10/white-hori@4x.png",
        "https://waterbear.org.uk/wp-content/smush-webp/2025/01/hn-1536x796.jpg.webp",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_dynamic_patterns() -> Vec<String> {
    vec![
        r"^https://fonts\.googleapis\.com/".to_string(),
        r"^https://fonts\.gstatic\.com/".to_string(),
    ]
}

fn default_shell_document() -> String {
    "/".to_string()
}

fn default_skip_waiting() -> bool {
    true
}

fn default_image_placeholder() -> String {
    "image/svg+xml".to_string()
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            cms_host: default_cms_host(),
            static_assets: default_static_assets(),
            dynamic_patterns: default_dynamic_patterns(),
            shell_document: default_shell_document(),
            skip_waiting_on_install: default_skip_waiting(),
            image_placeholder_content_type: default_image_placeholder(),
        }
    }
}

impl OfflineConfig {
    /// Create a config for a version served from `origin`.
    pub fn new(version: impl Into<String>, origin: Url) -> Self {
        Self {
            version: version.into(),
            origin,
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_cms_host(mut self, host: impl Into<String>) -> Self {
        self.cms_host = host.into();
        self
    }

    pub fn with_static_assets(mut self, assets: Vec<String>) -> Self {
        self.static_assets = assets;
        self
    }

    pub fn with_dynamic_patterns(mut self, patterns: Vec<String>) -> Self {
        self.dynamic_patterns = patterns;
        self
    }

    pub fn with_skip_waiting(mut self, skip: bool) -> Self {
        self.skip_waiting_on_install = skip;
        self
    }

    /// Check the version, origin, asset list and patterns.
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::InvalidConfig("version must not be empty".into()));
        }
        if self.origin.host_str().is_none() {
            return Err(Error::InvalidConfig(format!(
                "origin has no host: {}",
                self.origin
            )));
        }
        if self.cms_host.trim().is_empty() {
            return Err(Error::InvalidConfig("cms_host must not be empty".into()));
        }
        self.static_asset_urls()?;
        self.compiled_patterns()?;
        self.shell_url()?;
        Ok(())
    }

    /// Resolve a path or absolute URL against the origin.
    pub fn resolve(&self, asset: &str) -> Result<Url> {
        self.origin
            .join(asset)
            .map_err(|e| Error::InvalidConfig(format!("invalid asset '{}': {}", asset, e)))
    }

    /// The static asset list as absolute URLs, in configured order.
    pub fn static_asset_urls(&self) -> Result<Vec<Url>> {
        self.static_assets.iter().map(|a| self.resolve(a)).collect()
    }

    /// URL of the document served for offline navigations.
    pub fn shell_url(&self) -> Result<Url> {
        self.resolve(&self.shell_document)
    }

    /// The dynamic cache patterns, compiled.
    pub fn compiled_patterns(&self) -> Result<Vec<Regex>> {
        self.dynamic_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| Error::InvalidConfig(format!("invalid pattern '{}': {}", p, e)))
            })
            .collect()
    }
}
