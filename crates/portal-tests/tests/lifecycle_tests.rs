//! Install and activate tests.

use portal_core::Error;
use portal_core::ports::CacheStorage;
use portal_core::Response;
use portal_offline::ServiceWorker;
use portal_tests::{ConfigFixture, RequestFixture, TestContext, site_url};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_install_caches_every_static_asset() {
    let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v1"));
    let manager = ctx.manager().unwrap();

    let outcome = manager.on_install().await.unwrap();

    assert_eq!(outcome.generation, "waterbear-portal-v1");
    assert_eq!(outcome.cached, 4);
    assert!(outcome.skip_waiting);

    let keys = ctx.storage.entry_keys("waterbear-portal-v1").await.unwrap();
    assert_eq!(keys.len(), 4);
    for url in ctx.config.static_asset_urls().unwrap() {
        let cached = ctx
            .storage
            .match_request("waterbear-portal-v1", &RequestFixture::get(url.as_str()))
            .await
            .unwrap();
        assert!(cached.is_some(), "{} was not cached", url);
    }
}

#[tokio::test]
async fn test_install_is_all_or_nothing_on_transport_failure() {
    let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v1"));
    ctx.network.fail(&site_url("/style.css"));
    let manager = ctx.manager().unwrap();

    let err = manager.on_install().await.unwrap_err();

    match err {
        Error::InstallFailed { version, url, .. } => {
            assert_eq!(version, "waterbear-portal-v1");
            assert_eq!(url, "https://portal.test/style.css");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ctx.storage.has("waterbear-portal-v1").await.unwrap());
    assert!(ctx.storage.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_install_is_all_or_nothing_on_error_status() {
    let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v1"));
    ctx.network
        .route(&site_url("/index.html"), Response::new(500, "boom"));
    let manager = ctx.manager().unwrap();

    let err = manager.on_install().await.unwrap_err();

    assert!(matches!(err, Error::InstallFailed { ref reason, .. } if reason.contains("500")));
    assert!(ctx.storage.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_install_keeps_previous_generation() {
    let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v1"));
    ctx.manager().unwrap().on_install().await.unwrap();

    let next = ConfigFixture::small("waterbear-portal-v2")
        .with_static_assets(vec!["/".into(), "/missing.js".into()]);
    let err = ctx.manager_for(next).unwrap().on_install().await;

    assert!(err.is_err());
    assert_eq!(
        ctx.storage.keys().await.unwrap(),
        vec!["waterbear-portal-v1".to_string()]
    );
}

#[tokio::test]
async fn test_activate_leaves_exactly_one_generation() {
    let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v2"));
    ctx.storage.open("waterbear-portal-v1").await.unwrap();
    ctx.storage.open("some-other-cache").await.unwrap();

    let manager = ctx.manager().unwrap();
    manager.on_install().await.unwrap();
    let outcome = manager.on_activate().await.unwrap();

    assert!(outcome.claim_clients);
    let mut deleted = outcome.deleted.clone();
    deleted.sort();
    assert_eq!(deleted, vec!["some-other-cache", "waterbear-portal-v1"]);
    assert_eq!(
        ctx.storage.keys().await.unwrap(),
        vec!["waterbear-portal-v2".to_string()]
    );
}

#[tokio::test]
async fn test_activate_with_nothing_to_evict() {
    let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v1"));
    let manager = ctx.manager().unwrap();
    manager.on_install().await.unwrap();

    let outcome = manager.on_activate().await.unwrap();

    assert!(outcome.deleted.is_empty());
    assert_eq!(ctx.storage.keys().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_skip_waiting_follows_config() {
    let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v1").with_skip_waiting(false));
    let outcome = ctx.manager().unwrap().on_install().await.unwrap();
    assert!(!outcome.skip_waiting);
}
