//! Request classification.
//!
//! The classifier is an ordered list of (matcher, class) rules evaluated top
//! down; the first rule that matches decides the class. Requests matched by
//! no rule fall into [`RequestClass::Default`]. Non-`GET` requests are never
//! classified at all and go straight to the network.

use crate::config::OfflineConfig;
use crate::strategy::Strategy;
use portal_core::{Method, Request, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Content class of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// CMS content-delivery API.
    CmsApi,
    /// Part of the pre-cached static asset list.
    StaticAsset,
    /// Matches a dynamic cache pattern.
    DynamicPattern,
    Default,
}

impl RequestClass {
    /// The strategy used to answer requests of this class.
    pub fn strategy(&self) -> Strategy {
        match self {
            RequestClass::CmsApi => Strategy::NetworkFirstWithRefresh,
            RequestClass::StaticAsset | RequestClass::DynamicPattern => Strategy::CacheFirst,
            RequestClass::Default => Strategy::NetworkFirstWithFallback,
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClass::CmsApi => write!(f, "cms_api"),
            RequestClass::StaticAsset => write!(f, "static_asset"),
            RequestClass::DynamicPattern => write!(f, "dynamic_pattern"),
            RequestClass::Default => write!(f, "default"),
        }
    }
}

/// Predicate over a request URL.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Host name equals the given host exactly.
    Host(String),
    /// URL equals the given URL, ignoring the fragment.
    Exact(Url),
    /// URL contains the given string.
    Contains(String),
    /// URL matches the regular expression.
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Matcher::Host(host) => url.host_str() == Some(host.as_str()),
            Matcher::Exact(expected) => {
                let mut url = url.clone();
                url.set_fragment(None);
                url == *expected
            }
            Matcher::Contains(needle) => url.as_str().contains(needle.as_str()),
            Matcher::Pattern(re) => re.is_match(url.as_str()),
        }
    }

    /// Matcher for one static asset.
    ///
    /// The site root only matches itself; every other asset matches any URL
    /// containing its absolute form, so cache-busting query strings still hit.
    fn for_asset(url: Url) -> Self {
        if url.path() == "/" && url.query().is_none() {
            Matcher::Exact(url)
        } else {
            Matcher::Contains(url.to_string())
        }
    }
}

/// One classification rule.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    pub matcher: Matcher,
    pub class: RequestClass,
}

impl ClassifierRule {
    pub fn new(matcher: Matcher, class: RequestClass) -> Self {
        Self { matcher, class }
    }
}

/// Ordered rule list deciding which strategy answers a request.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    rules: Vec<ClassifierRule>,
}

impl RequestClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Build the rule list for a deploy: CMS host, then static assets, then
    /// dynamic patterns.
    pub fn from_config(config: &OfflineConfig) -> Result<Self> {
        let mut rules = vec![ClassifierRule::new(
            Matcher::Host(config.cms_host.clone()),
            RequestClass::CmsApi,
        )];

        for url in config.static_asset_urls()? {
            rules.push(ClassifierRule::new(
                Matcher::for_asset(url),
                RequestClass::StaticAsset,
            ));
        }

        for pattern in config.compiled_patterns()? {
            rules.push(ClassifierRule::new(
                Matcher::Pattern(pattern),
                RequestClass::DynamicPattern,
            ));
        }

        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classify a request. `None` means the request is not intercepted.
    pub fn classify(&self, request: &Request) -> Option<RequestClass> {
        if request.method != Method::Get {
            return None;
        }
        let class = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(&request.url))
            .map(|rule| rule.class)
            .unwrap_or(RequestClass::Default);
        Some(class)
    }
}
