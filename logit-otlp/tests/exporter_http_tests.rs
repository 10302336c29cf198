use std::time::Duration;

use logit_core::{Backend, Event, Level, SourceLocation, Span, Status};
use logit_otlp::{OtlpBackend, OtlpConfig};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_diagnostics() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sample_event(name: &str) -> Event {
    let mut span = Span::new(name);
    span.set_attr("attempt", 1);
    let location = SourceLocation::new("lib.rs", 5, "op", "app::jobs");
    span.into_event(Level::Info, location, Status::Ok)
}

async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    for _ in 0..100 {
        let received = server.received_requests().await.unwrap_or_default().len();
        if received >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("collector never received {} request(s)", count);
}

// ===== Delivery Tests =====

#[tokio::test]
async fn test_flush_posts_one_batch() {
    init_diagnostics();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = OtlpConfig::new(server.uri())
        .with_batch_size(100)
        .with_flush_interval(Duration::from_secs(3600));
    let backend = OtlpBackend::new(config).unwrap();

    backend.log(&sample_event("one")).unwrap();
    backend.log(&sample_event("two")).unwrap();
    backend.flush().await.unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let records = bodies[0]["resourceLogs"][0]["scopeLogs"][0]["logRecords"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["body"]["stringValue"], "one");
    assert_eq!(records[1]["body"]["stringValue"], "two");

    backend.close().await.unwrap();
}

#[tokio::test]
async fn test_batch_size_triggers_export() {
    init_diagnostics();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let config = OtlpConfig::new(server.uri())
        .with_batch_size(2)
        .with_flush_interval(Duration::from_secs(3600));
    let backend = OtlpBackend::new(config).unwrap();

    backend.log(&sample_event("a")).unwrap();
    backend.log(&sample_event("b")).unwrap();

    wait_for_requests(&server, 1).await;
    let bodies = received_bodies(&server).await;
    let records = bodies[0]["resourceLogs"][0]["scopeLogs"][0]["logRecords"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(records.len(), 2);

    backend.close().await.unwrap();
}

#[tokio::test]
async fn test_close_drains_pending_events() {
    init_diagnostics();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = OtlpConfig::new(server.uri())
        .with_batch_size(100)
        .with_flush_interval(Duration::from_secs(3600));
    let backend = OtlpBackend::new(config).unwrap();

    backend.log(&sample_event("last")).unwrap();
    backend.close().await.unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
}

// ===== Payload Content Tests =====

#[tokio::test]
async fn test_resource_and_headers_reach_collector() {
    init_diagnostics();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = OtlpConfig::new(server.uri())
        .with_service_name("checkout")
        .with_header("authorization", "Bearer test-token")
        .with_batch_size(100);
    let backend = OtlpBackend::new(config).unwrap();

    backend.log(&sample_event("op")).unwrap();
    backend.flush().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(
        request
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok()),
        Some("Bearer test-token")
    );
    assert_eq!(
        request
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok()),
        Some("application/json")
    );

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    let resource_attrs = body["resourceLogs"][0]["resource"]["attributes"]
        .as_array()
        .unwrap()
        .clone();
    assert!(resource_attrs.iter().any(|attr| {
        attr["key"] == "service.name" && attr["value"]["stringValue"] == "checkout"
    }));

    backend.close().await.unwrap();
}

// ===== Failure Handling Tests =====

#[tokio::test]
async fn test_server_error_drops_batch_without_retry() {
    init_diagnostics();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = OtlpConfig::new(server.uri())
        .with_batch_size(100)
        .with_flush_interval(Duration::from_secs(3600));
    let backend = OtlpBackend::new(config).unwrap();

    backend.log(&sample_event("dropped")).unwrap();
    backend.flush().await.unwrap();
    // The failed batch is gone; only the new event goes out.
    backend.log(&sample_event("delivered")).unwrap();
    backend.flush().await.unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    let second = bodies[1]["resourceLogs"][0]["scopeLogs"][0]["logRecords"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0]["body"]["stringValue"], "delivered");

    backend.close().await.unwrap();
}

#[tokio::test]
async fn test_rejected_batches_do_not_break_the_backend() {
    init_diagnostics();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/logs"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = OtlpConfig::new(server.uri()).with_batch_size(100);
    let backend = OtlpBackend::new(config).unwrap();

    backend.log(&sample_event("unauthorized")).unwrap();
    backend.flush().await.unwrap();
    backend.log(&sample_event("still-works")).unwrap();
    backend.flush().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    backend.close().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_collector_never_errors() {
    init_diagnostics();
    let config = OtlpConfig::new("http://127.0.0.1:1")
        .with_batch_size(100)
        .with_timeout(Duration::from_secs(2));
    let backend = OtlpBackend::new(config).unwrap();

    backend.log(&sample_event("lost")).unwrap();
    backend.flush().await.unwrap();
    backend.close().await.unwrap();
}
