//! Fetch handling tests: classification, strategies and offline fallbacks.

use portal_core::ports::CacheStorage;
use portal_core::{Error, ResponseType};
use portal_offline::{
    FetchOutcome, OFFLINE_ERROR_MESSAGE, OfflineCacheManager, RequestClass, ResponseSource,
    ServiceWorker,
};
use portal_tests::{
    CMS_ENTRIES_URL, ConfigFixture, FONT_CSS_URL, RequestFixture, ResponseFixture, TestContext,
    site_url,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use url::Url;

const VERSION: &str = "waterbear-portal-v1";

async fn installed() -> (TestContext, OfflineCacheManager) {
    let ctx = TestContext::new(ConfigFixture::small(VERSION));
    let manager = ctx.manager().unwrap();
    manager.on_install().await.unwrap();
    manager.on_activate().await.unwrap();
    (ctx, manager)
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn test_static_asset_served_from_cache_without_network() {
    let (ctx, manager) = installed().await;
    let style = site_url("/style.css");
    assert_eq!(ctx.network.fetch_count(&style), 1);

    for _ in 0..3 {
        let outcome = manager.on_fetch(&RequestFixture::get(style.as_str())).await;
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert_eq!(outcome.response().unwrap().text(), "body{margin:0}");
    }

    assert_eq!(ctx.network.fetch_count(&style), 1);
}

#[tokio::test]
async fn test_static_asset_with_cache_busting_query_matches_rule() {
    let (_ctx, manager) = installed().await;
    let request = RequestFixture::get("https://portal.test/style.css?v=42");
    assert_eq!(manager.classify(&request), Some(RequestClass::StaticAsset));
}

#[tokio::test]
async fn test_dynamic_pattern_cached_after_first_fetch() {
    let (ctx, manager) = installed().await;
    let font = url(FONT_CSS_URL);
    ctx.network.route_ok(&font, "@font-face{}");
    let request = RequestFixture::get(FONT_CSS_URL);
    assert_eq!(manager.classify(&request), Some(RequestClass::DynamicPattern));

    let first = manager.on_fetch(&request).await;
    assert_eq!(first.source(), Some(ResponseSource::Network));
    assert_eq!(first.response().unwrap().kind, ResponseType::Cors);

    let second = manager.on_fetch(&request).await;
    assert_eq!(second.source(), Some(ResponseSource::Cache));
    assert_eq!(second.response().unwrap().text(), "@font-face{}");
    assert_eq!(ctx.network.fetch_count(&font), 1);
}

#[tokio::test]
async fn test_cache_first_does_not_store_errors() {
    let (ctx, manager) = installed().await;
    let font = url("https://fonts.gstatic.com/s/inter/missing.woff2");
    let request = RequestFixture::get(font.as_str());

    let outcome = manager.on_fetch(&request).await;
    assert_eq!(outcome.response().unwrap().status, 404);

    manager.on_fetch(&request).await;
    assert_eq!(ctx.network.fetch_count(&font), 2);
}

#[tokio::test]
async fn test_cache_first_offline_and_uncached_fails() {
    let (ctx, manager) = installed().await;
    ctx.network.set_offline(true);

    let outcome = manager.on_fetch(&RequestFixture::get(FONT_CSS_URL)).await;
    assert!(matches!(outcome, FetchOutcome::Failed(Error::Network(_))));
}

#[tokio::test]
async fn test_cms_offline_without_cache_returns_structured_503() {
    let (ctx, manager) = installed().await;
    ctx.network.set_offline(true);

    let outcome = manager.on_fetch(&RequestFixture::get(CMS_ENTRIES_URL)).await;

    assert_eq!(outcome.source(), Some(ResponseSource::OfflineError));
    let response = outcome.response().unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.content_type(), Some("application/json"));
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"error": OFFLINE_ERROR_MESSAGE, "items": []})
    );
}

#[tokio::test]
async fn test_cms_offline_serves_last_good_response() {
    let (ctx, manager) = installed().await;
    let cms = url(CMS_ENTRIES_URL);
    ctx.network.route(&cms, ResponseFixture::cms_entries("Bristol"));

    let online = manager.on_fetch(&RequestFixture::get(CMS_ENTRIES_URL)).await;
    assert_eq!(online.source(), Some(ResponseSource::Network));
    manager.settle().await;

    ctx.network.set_offline(true);
    let offline = manager.on_fetch(&RequestFixture::get(CMS_ENTRIES_URL)).await;

    assert_eq!(offline.source(), Some(ResponseSource::Cache));
    assert_eq!(
        offline.response().unwrap().body,
        online.response().unwrap().body
    );
}

#[tokio::test]
async fn test_cms_refreshes_cache_on_every_online_fetch() {
    let (ctx, manager) = installed().await;
    let cms = url(CMS_ENTRIES_URL);

    ctx.network.route(&cms, ResponseFixture::cms_entries("Bristol"));
    manager.on_fetch(&RequestFixture::get(CMS_ENTRIES_URL)).await;
    manager.settle().await;
    ctx.network.route(&cms, ResponseFixture::cms_entries("Leeds"));
    manager.on_fetch(&RequestFixture::get(CMS_ENTRIES_URL)).await;
    manager.settle().await;

    let cached = ctx
        .storage
        .match_request(VERSION, &RequestFixture::get(CMS_ENTRIES_URL))
        .await
        .unwrap()
        .unwrap();
    assert!(cached.text().contains("Leeds"));
}

#[tokio::test]
async fn test_non_get_requests_bypass_the_cache() {
    let (ctx, manager) = installed().await;
    let before = manager.metrics().snapshot();

    let post = RequestFixture::post("https://portal.test/style.css");
    assert_eq!(manager.classify(&post), None);
    assert!(matches!(manager.on_fetch(&post).await, FetchOutcome::Passthrough));

    let cms_post = RequestFixture::post(CMS_ENTRIES_URL);
    assert!(matches!(manager.on_fetch(&cms_post).await, FetchOutcome::Passthrough));
    manager.settle().await;

    let after = manager.metrics().snapshot();
    assert_eq!(after.bypassed, before.bypassed + 2);
    assert_eq!(after.cache_hits, before.cache_hits);
    assert_eq!(after.cache_misses, before.cache_misses);
    assert_eq!(after.network_fetches, before.network_fetches);
    assert!(
        ctx.storage
            .entry_keys(VERSION)
            .await
            .unwrap()
            .iter()
            .all(|k| k.as_str().starts_with("GET "))
    );
}

#[tokio::test]
async fn test_default_strategy_stores_same_origin_ok_responses() {
    let (ctx, manager) = installed().await;
    let page = site_url("/courses.html");
    ctx.network.route(&page, ResponseFixture::html("Courses"));

    let online = manager.on_fetch(&RequestFixture::get(page.as_str())).await;
    assert_eq!(online.source(), Some(ResponseSource::Network));
    manager.settle().await;

    ctx.network.set_offline(true);
    let offline = manager.on_fetch(&RequestFixture::get(page.as_str())).await;
    assert_eq!(offline.source(), Some(ResponseSource::Cache));
    assert!(offline.response().unwrap().text().contains("Courses"));
}

#[tokio::test]
async fn test_default_strategy_skips_cross_origin_and_error_responses() {
    let (ctx, manager) = installed().await;
    let cross = url("https://api.example.com/events.json");
    ctx.network.route_ok(&cross, "[]");
    let missing = site_url("/gone.html");

    manager.on_fetch(&RequestFixture::get(cross.as_str())).await;
    manager.on_fetch(&RequestFixture::get(missing.as_str())).await;
    manager.settle().await;

    let cached_cross = ctx
        .storage
        .match_request(VERSION, &RequestFixture::get(cross.as_str()))
        .await
        .unwrap();
    let cached_missing = ctx
        .storage
        .match_request(VERSION, &RequestFixture::get(missing.as_str()))
        .await
        .unwrap();
    assert!(cached_cross.is_none());
    assert!(cached_missing.is_none());
}

#[tokio::test]
async fn test_offline_navigation_falls_back_to_root_document() {
    let (ctx, manager) = installed().await;
    ctx.network.set_offline(true);

    let outcome = manager.on_fetch(&RequestFixture::navigate("/timetable")).await;

    assert_eq!(outcome.source(), Some(ResponseSource::ShellFallback));
    let root = ctx
        .storage
        .match_request(VERSION, &RequestFixture::get("https://portal.test/"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.response().unwrap().body, root.body);
}

#[tokio::test]
async fn test_offline_navigation_prefers_exact_cached_page() {
    let (ctx, manager) = installed().await;
    let page = site_url("/news.html");
    ctx.network.route(&page, ResponseFixture::html("News"));
    manager.on_fetch(&RequestFixture::navigate("/news.html")).await;
    manager.settle().await;

    ctx.network.set_offline(true);
    let outcome = manager.on_fetch(&RequestFixture::navigate("/news.html")).await;

    assert_eq!(outcome.source(), Some(ResponseSource::Cache));
    assert!(outcome.response().unwrap().text().contains("News"));
}

#[tokio::test]
async fn test_offline_image_gets_placeholder() {
    let (ctx, manager) = installed().await;
    ctx.network.set_offline(true);

    let outcome = manager
        .on_fetch(&RequestFixture::image("https://images.ctfassets.net/abc/campus"))
        .await;

    assert_eq!(outcome.source(), Some(ResponseSource::Placeholder));
    let response = outcome.response().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("image/svg+xml"));
    assert!(response.body.is_empty());
    assert_eq!(response.kind, ResponseType::Synthetic);
}

#[tokio::test]
async fn test_offline_image_by_extension_gets_placeholder() {
    let (ctx, manager) = installed().await;
    ctx.network.set_offline(true);

    let outcome = manager
        .on_fetch(&RequestFixture::get("https://portal.test/img/campus.jpg"))
        .await;
    assert_eq!(outcome.source(), Some(ResponseSource::Placeholder));
}

#[tokio::test]
async fn test_offline_other_request_fails() {
    let (ctx, manager) = installed().await;
    ctx.network.set_offline(true);

    let outcome = manager
        .on_fetch(&RequestFixture::get("https://portal.test/api/unknown.json"))
        .await;
    assert!(matches!(outcome, FetchOutcome::Failed(_)));
}

#[tokio::test]
async fn test_metrics_count_hits_and_fallbacks() {
    let (ctx, manager) = installed().await;
    manager
        .on_fetch(&RequestFixture::get("https://portal.test/style.css"))
        .await;
    ctx.network.set_offline(true);
    manager.on_fetch(&RequestFixture::navigate("/anywhere")).await;

    let snapshot = manager.metrics().snapshot();
    assert!(snapshot.cache_hits >= 2);
    assert_eq!(snapshot.offline_fallbacks, 1);
    assert_eq!(snapshot.network_failures, 1);
}

#[tokio::test]
async fn test_synthetic_responses_are_never_written() {
    let (ctx, manager) = installed().await;
    ctx.network.set_offline(true);
    manager.on_fetch(&RequestFixture::get(CMS_ENTRIES_URL)).await;
    manager
        .on_fetch(&RequestFixture::image("https://portal.test/img/x.png"))
        .await;
    manager.settle().await;

    let keys = ctx.storage.entry_keys(VERSION).await.unwrap();
    assert_eq!(keys.len(), 4);
}
