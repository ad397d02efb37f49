//! Integration tests for the provider chain built from configuration.

use std::sync::Arc;

use bookmeta_core::config::AmazonCreatorsConfig;
use bookmeta_core::{
    AppConfig, CacheStore, Catalog, CatalogStore, Database, MemoryCache, Region,
    SearchOrchestrator, SearchParams, build_default_providers,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn full_config(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.google_books.base_url = server.uri();
    config.google_books.timeout_secs = 5;
    config.open_library.base_url = server.uri();
    config.open_library.timeout_secs = 5;
    config.amazon.creators = AmazonCreatorsConfig {
        enabled: true,
        credential_id: Some("client".to_string()),
        credential_secret: Some("secret".to_string()),
        token_url: format!("{}/oauth2/token", server.uri()),
        base_url: Some(server.uri()),
        timeout_secs: 5,
        inter_page_delay_ms: 0,
        ..AmazonCreatorsConfig::default()
    };
    config.amazon.affiliate_tags.set(Region::Br, "bookmeta-20");
    config
}

async fn mount_empty_free_providers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/volumes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"totalItems": 0})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"numFound": 0, "docs": []})),
        )
        .mount(server)
        .await;
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-1",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

async fn orchestrator(config: &AppConfig) -> SearchOrchestrator {
    let catalog: Arc<dyn CatalogStore> =
        Arc::new(Catalog::new(Database::new_in_memory().await.unwrap()));
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let providers = build_default_providers(config, Arc::clone(&cache));
    SearchOrchestrator::new(catalog, providers, cache)
}

#[tokio::test]
async fn test_default_chain_is_sorted_and_gated_by_config() {
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());

    let chain = build_default_providers(&AppConfig::default(), Arc::clone(&cache));
    let names: Vec<&str> = chain.providers().iter().map(|p| p.name()).collect();
    assert_eq!(
        names,
        vec![
            "Google Books",
            "Open Library",
            "Amazon Creators",
            "Amazon PA-API",
            "Amazon Links"
        ]
    );
    let enabled: Vec<&str> = chain.enabled().map(|p| p.name()).collect();
    assert_eq!(enabled, vec!["Google Books", "Open Library"]);

    let mut config = AppConfig::default();
    config.google_books.enabled = false;
    config.amazon.legacy.enabled = true;
    config.amazon.affiliate_tags.set(Region::Us, "tag-20");
    let chain = build_default_providers(&config, cache);
    let enabled: Vec<&str> = chain.enabled().map(|p| p.name()).collect();
    assert_eq!(enabled, vec!["Open Library", "Amazon Links"]);
}

#[tokio::test]
async fn test_amazon_creators_wins_after_free_providers_miss() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_empty_free_providers(&server).await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/catalog/v1/searchItems"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "searchResult": {
                "totalResultCount": 1,
                "items": [{
                    "asin": "B0AMAZON01",
                    "itemInfo": {"title": {"displayValue": "Only On Amazon"}}
                }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = orchestrator(&full_config(&server))
        .await
        .search("only on amazon", &SearchParams::default())
        .await;

    assert!(response.success, "{}", response.message);
    assert_eq!(response.provider.as_deref(), Some("Amazon Creators"));
    assert_eq!(
        response.providers_tried,
        vec!["Google Books", "Open Library", "Amazon Creators"]
    );
    assert_eq!(response.books[0].amazon_asin.as_deref(), Some("B0AMAZON01"));
}

#[tokio::test]
async fn test_rate_limited_amazon_is_skipped_and_link_hint_surfaces() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_empty_free_providers(&server).await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/catalog/v1/searchItems"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&full_config(&server)).await;
    let first = orchestrator
        .search("first missing book", &SearchParams::default())
        .await;
    let second = orchestrator
        .search("second missing book", &SearchParams::default())
        .await;

    for response in [&first, &second] {
        assert!(!response.success);
        assert_eq!(
            response.providers_tried,
            vec![
                "Google Books",
                "Open Library",
                "Amazon Creators",
                "Amazon Links"
            ]
        );
        assert!(
            response
                .suggestions
                .iter()
                .any(|hint| hint.contains("amazon.com.br") && hint.contains("tag=bookmeta-20")),
            "missing marketplace hint: {:?}",
            response.suggestions
        );
    }
}
