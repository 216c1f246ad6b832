use std::time::Duration;

use geofetch_api::{Client, Error, JsonClient, ReverseQuery};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

#[tokio::test]
async fn reverse_success() {
    let mock_server = MockServer::start().await;
    let body = load_fixture("reverse_madrid.json");

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "40.4168"))
        .and(query_param("lon", "-3.7038"))
        .and(query_param("format", "jsonv2"))
        .and(header("user-agent", "geofetch-tests/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri(), "geofetch-tests/1.0").unwrap();
    let result = client.reverse(&ReverseQuery::new(40.4168, -3.7038)).await;
    assert!(result.is_ok());

    let resp = result.unwrap();
    assert_eq!(
        resp.address.unwrap().road.as_deref(),
        Some("Calle Mayor")
    );
}

#[tokio::test]
async fn reverse_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri(), "geofetch-tests/1.0").unwrap();
    let result = client.reverse(&ReverseQuery::new(1.0, 2.0)).await;
    match result {
        Err(Error::HttpStatus { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "Service Unavailable");
        }
        other => panic!("expected HttpStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn reverse_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not valid json}"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri(), "geofetch-tests/1.0").unwrap();
    let result = client.reverse(&ReverseQuery::new(1.0, 2.0)).await;
    assert!(matches!(result, Err(Error::Parse(_))));
}

#[tokio::test]
async fn json_client_passes_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stats/daily"))
        .and(query_param("region", "north"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 42})),
        )
        .mount(&mock_server)
        .await;

    let client = JsonClient::new(&mock_server.uri()).unwrap();
    let value = client
        .get_json("stats/daily", &[("region".to_string(), "north".to_string())])
        .await
        .unwrap();
    assert_eq!(value["total"], 42);
}

#[tokio::test]
async fn json_client_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let client =
        JsonClient::with_timeout(&mock_server.uri(), Duration::from_millis(100)).unwrap();
    let result = client.get_json("/slow", &[]).await;
    assert!(matches!(result, Err(Error::Timeout)));
}
