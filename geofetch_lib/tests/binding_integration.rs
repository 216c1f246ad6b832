use std::sync::Arc;
use std::time::Duration;

use geofetch_lib::geofetch_api::JsonClient;
use geofetch_lib::{
    BindingOptions, DataCache, EndpointRequest, FetchError, FetchOutcome, MemoryCache, Scope,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn data_cache(server: &MockServer) -> DataCache<JsonClient> {
    let client = JsonClient::new(&server.uri()).unwrap();
    let store = Arc::new(MemoryCache::new(Duration::from_secs(300)));
    DataCache::new(store, client)
}

fn daily_stats() -> EndpointRequest {
    EndpointRequest::new("/stats/daily").with_param("region", "north")
}

#[tokio::test]
async fn second_binding_is_served_from_cache() {
    let mock_server = MockServer::start().await;
    let body = json!({"region": "north", "visits": 1204});

    Mock::given(method("GET"))
        .and(path("/stats/daily"))
        .and(query_param("region", "north"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = data_cache(&mock_server);

    let first = cache.bind(daily_stats(), BindingOptions::default(), Scope::new());
    assert_eq!(first.mount().await, FetchOutcome::Applied);
    let snapshot = first.snapshot();
    assert_eq!(snapshot.data, Some(body.clone()));
    assert!(!snapshot.cached);
    assert!(snapshot.last_updated.is_some());

    let second = cache.bind(daily_stats(), BindingOptions::default(), Scope::new());
    assert_eq!(second.mount().await, FetchOutcome::FromCache);
    let snapshot = second.snapshot();
    assert_eq!(snapshot.data, Some(body));
    assert!(snapshot.cached);
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn refetch_bypasses_fresh_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stats/daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"visits": 1})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats/daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"visits": 2})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = data_cache(&mock_server);
    let binding = cache.bind(daily_stats(), BindingOptions::default(), Scope::new());

    assert_eq!(binding.mount().await, FetchOutcome::Applied);
    assert_eq!(binding.refetch().await, FetchOutcome::Applied);

    assert_eq!(binding.snapshot().data, Some(json!({"visits": 2})));
    assert_eq!(
        cache.store().get(binding.key().as_str()),
        Some(json!({"visits": 2}))
    );
}

#[tokio::test]
async fn http_error_is_reported_and_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stats/daily"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let cache = data_cache(&mock_server);
    let binding = cache.bind(daily_stats(), BindingOptions::default(), Scope::new());

    let outcome = binding.mount().await;
    assert!(matches!(outcome, FetchOutcome::Failed(_)));

    let snapshot = binding.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.data.is_none());
    assert!(matches!(
        snapshot.error,
        Some(FetchError::HttpStatus { status: 503, .. })
    ));
    assert_eq!(cache.store().stats().total, 0);
}

#[tokio::test]
async fn unmount_discards_response_in_flight() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stats/daily"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"visits": 7}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let cache = data_cache(&mock_server);
    let binding = cache.bind(daily_stats(), BindingOptions::default(), Scope::new());

    let mounting = tokio::spawn({
        let binding = binding.clone();
        async move { binding.mount().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    binding.unmount();

    assert_eq!(mounting.await.unwrap(), FetchOutcome::Ignored);
    assert!(binding.snapshot().data.is_none());
    assert_eq!(cache.store().stats().total, 0);
}
