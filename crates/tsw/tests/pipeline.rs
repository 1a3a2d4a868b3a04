//! Integration tests for the request pipeline.
//!
//! These tests run the client against a wiremock server and check headers,
//! query handling, error classification, body capture, traffic dumps,
//! completion callbacks and cancellation.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde_json::json;
use tsw::{
    with_header, with_query_param, CancellationToken, Client, Error, RequestBody, Region,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Helpers
// =============================================================================

/// In-memory `Write` sink shared between the client and the test.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(format!("{}/v2/", server.uri()))
        .authorization("test-key")
        .build()
        .unwrap()
}

fn envelope(result: serde_json::Value) -> serde_json::Value {
    json!({ "success": true, "metadata": { "total_count": 0, "limit": 0, "skip": 0 }, "result": result })
}

async fn api_error(server: &MockServer, response: ResponseTemplate) -> tsw::ErrorResponse {
    Mock::given(method("POST"))
        .and(path("/v2/Metal/1/PowerCommand"))
        .respond_with(response)
        .mount(server)
        .await;

    let client = client_for(server);
    let err = client
        .send_power_command(&CancellationToken::new(), 1, tsw::PowerCommand::PowerOn)
        .await
        .unwrap_err();
    assert!(err.is_protocol(), "expected an API error, got {err:?}");
    match err {
        Error::Api(response) => response,
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Request building
// =============================================================================

#[tokio::test]
async fn test_default_headers_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/region"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.list_regions(&CancellationToken::new()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.starts_with("tsw-rs/"), "unexpected user agent {agent}");
    assert!(requests[0].headers.get("content-type").is_none());
}

#[tokio::test]
async fn test_custom_auth_header_and_user_agent_prefix() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/image"))
        .and(header("x-api-key", "Bearer test-key"))
        .and(header("x-request-source", "ci"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(format!("{}/v2/", server.uri()))
        .authorization("test-key")
        .auth_header("X-Api-Key")
        .user_agent("provisioner/2.1")
        .header("X-Request-Source", "ci")
        .build()
        .unwrap();
    client.list_images(&CancellationToken::new()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.starts_with("provisioner/2.1 tsw-rs/"));
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_base_url_without_trailing_slash() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/region"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
            { "id": "LAX1", "displayName": "Los Angeles" }
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(format!("{}/v2", server.uri()))
        .build()
        .unwrap();
    let regions = client.list_regions(&CancellationToken::new()).await.unwrap();
    assert_eq!(
        regions,
        vec![Region {
            id: "LAX1".into(),
            display_name: "Los Angeles".into(),
            location: None,
        }]
    );
}

#[tokio::test]
async fn test_json_body_keeps_html_characters() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/Metal/7/rename"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .rename_metal(&CancellationToken::new(), 7, "web<1>&db")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, br#"{"name":"web<1>&db"}"#.to_vec());
}

#[tokio::test]
async fn test_later_query_param_overrides_earlier() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/Metal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .request(
            &CancellationToken::new(),
            Method::GET,
            "Metal",
            RequestBody::Empty,
            &[
                with_query_param("Limit", "1"),
                with_query_param("Region", "LAX1"),
                with_query_param("Limit", "2"),
                with_query_param("Tag", ""),
                with_header("X-Trace", "abc"),
            ],
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let pairs: Vec<(String, String)> = requests[0]
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("Region".to_string(), "LAX1".to_string()),
            ("Limit".to_string(), "2".to_string()),
        ]
    );
    assert_eq!(requests[0].headers.get("x-trace").unwrap(), "abc");
}

#[tokio::test]
async fn test_invalid_header_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client
        .request(
            &CancellationToken::new(),
            Method::GET,
            "region",
            RequestBody::Empty,
            &[with_header("bad header", "x")],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// =============================================================================
// Error classification
// =============================================================================

#[tokio::test]
async fn test_error_message_from_json_body() {
    let server = MockServer::start().await;
    let err = api_error(
        &server,
        ResponseTemplate::new(400)
            .set_body_json(json!({ "success": false, "message": "tier unavailable" })),
    )
    .await;

    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.message, "tier unavailable");
    assert_eq!(err.method, Method::POST);
    assert!(err.to_string().contains("400 tier unavailable"));
}

#[tokio::test]
async fn test_error_message_falls_back_to_raw_body() {
    let server = MockServer::start().await;
    let err = api_error(&server, ResponseTemplate::new(502).set_body_string("bad gateway")).await;

    assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    assert_eq!(err.message, "bad gateway");
}

#[tokio::test]
async fn test_error_message_for_empty_body() {
    let server = MockServer::start().await;
    let err = api_error(&server, ResponseTemplate::new(404)).await;

    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.message, "unknown error");
}

#[tokio::test]
async fn test_malformed_success_body_is_decoding_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/Metal/5"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .get_metal(&CancellationToken::new(), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decoding(_)), "got {err:?}");
    assert!(err.status().is_none());
}

// =============================================================================
// Body capture and dumps
// =============================================================================

#[tokio::test]
async fn test_json_response_is_captured_and_replayed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/region"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_log_bodies(true);

    let ctx = CancellationToken::new();
    let response = client
        .request(&ctx, Method::GET, "region", RequestBody::Empty, &[])
        .await
        .unwrap();
    assert!(response.is_captured());

    let body: serde_json::Value = serde_json::from_slice(&response.bytes(&ctx).await.unwrap()).unwrap();
    assert_eq!(body, envelope(json!([])));
}

#[tokio::test]
async fn test_binary_response_is_not_captured() {
    let server = MockServer::start().await;
    let payload = vec![0u8, 159, 146, 150, 1, 2, 3];

    Mock::given(method("GET"))
        .and(path("/v2/Metal/9/Logs"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(payload.clone(), "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_log_bodies(true);

    let ctx = CancellationToken::new();
    let response = client
        .request(&ctx, Method::GET, "Metal/9/Logs", RequestBody::Empty, &[])
        .await
        .unwrap();
    assert!(!response.is_captured());
    assert_eq!(response.bytes(&ctx).await.unwrap().to_vec(), payload);
}

#[tokio::test]
async fn test_plain_logger_dumps_traffic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/Metal/3/rename"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let sink = SharedBuffer::default();
    let client = Client::builder()
        .base_url(format!("{}/v2/", server.uri()))
        .authorization("super-secret")
        .plain_logger(sink.clone())
        .log_bodies(true)
        .build()
        .unwrap();

    client
        .rename_metal(&CancellationToken::new(), 3, "db-1")
        .await
        .unwrap();

    let dump = sink.contents();
    assert!(dump.contains("http --> POST /v2/Metal/3/rename HTTP/1.1"), "{dump}");
    assert!(dump.contains("http --> Content-Type: application/json"), "{dump}");
    assert!(dump.contains(r#"http --> {"name":"db-1"}"#), "{dump}");
    assert!(dump.contains("http <-- HTTP/1.1 200 OK"), "{dump}");
    assert!(dump.contains(r#"http <-- {"success":true}"#), "{dump}");
    assert!(!dump.contains("super-secret"), "{dump}");
    for line in dump.lines() {
        assert!(
            line.starts_with("http --> ") || line.starts_with("http <-- "),
            "unprefixed line {line:?}"
        );
    }
}

#[tokio::test]
async fn test_streamed_body_is_sent_and_dumped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/Metal/3/rename"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = SharedBuffer::default();
    let client = Client::builder()
        .base_url(format!("{}/v2/", server.uri()))
        .plain_logger(sink.clone())
        .log_bodies(true)
        .build()
        .unwrap();

    let body = RequestBody::stream(futures::stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from_static(b"{\"name\":")),
        Ok(Bytes::from_static(b"\"db-1\"}")),
    ]));
    client
        .request(&CancellationToken::new(), Method::POST, "Metal/3/rename", body, &[])
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, br#"{"name":"db-1"}"#.to_vec());

    let dump = sink.contents();
    assert!(dump.contains("http --> Content-Type: application/json"), "{dump}");
    assert!(dump.contains(r#"http --> {"name":"db-1"}"#), "{dump}");
}

#[tokio::test]
async fn test_plain_logger_omits_bodies_unless_enabled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/region"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!([{ "id": "MARKER-REGION" }]))),
        )
        .mount(&server)
        .await;

    let sink = SharedBuffer::default();
    let client = client_for(&server);
    client.set_plain_logger(sink.clone());

    client.list_regions(&CancellationToken::new()).await.unwrap();

    let dump = sink.contents();
    assert!(dump.contains("http --> GET /v2/region HTTP/1.1"));
    assert!(!dump.contains("MARKER-REGION"));
}

#[tokio::test]
async fn test_client_logger_receives_sdk_events() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .mount(&server)
        .await;

    let sink = SharedBuffer::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    let client = client_for(&server);
    client.set_logger(tracing::Dispatch::new(subscriber));
    client.list_images(&CancellationToken::new()).await.unwrap();

    let logs = sink.contents();
    assert!(logs.contains("sdk request"), "{logs}");
    assert!(logs.contains("sdk response"), "{logs}");
    assert!(logs.contains("status=200"), "{logs}");
}

#[tokio::test]
async fn test_completion_callback_sees_every_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/region"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/Metal/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let client = client_for(&server);
    {
        let calls = Arc::clone(&calls);
        let statuses = Arc::clone(&statuses);
        client.on_request_completed(move |completed| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert!(completed.request_headers.contains_key("authorization"));
            statuses
                .lock()
                .unwrap()
                .push((completed.url.path().to_string(), completed.status));
        });
    }

    let ctx = CancellationToken::new();
    client.list_regions(&ctx).await.unwrap();
    client.get_metal(&ctx, 404).await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![
            ("/v2/region".to_string(), StatusCode::OK),
            ("/v2/Metal/404".to_string(), StatusCode::NOT_FOUND),
        ]
    );
}

// =============================================================================
// Cancellation and configuration snapshots
// =============================================================================

#[tokio::test]
async fn test_cancellation_interrupts_in_flight_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/region"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([])))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let ctx = CancellationToken::new();
    let token = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), client.list_regions(&ctx))
        .await
        .expect("cancellation did not interrupt the request");
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_timeout_applies_only_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/region"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([])))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let ctx = CancellationToken::new();
    client_for(&server).list_regions(&ctx).await.unwrap();

    let bounded = Client::builder()
        .base_url(format!("{}/v2/", server.uri()))
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), bounded.list_regions(&ctx))
        .await
        .expect("configured timeout did not fire");
    assert!(matches!(result, Err(Error::Transport(_))), "got {result:?}");
}

#[tokio::test]
async fn test_cancelled_token_sends_nothing() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = client.list_images(&ctx).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_setters_apply_to_later_requests() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;

    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path("/v2/Metal"))
            .and(query_param("Limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
            .expect(1)
            .mount(server)
            .await;
    }

    let client = client_for(&first);
    let opts = tsw::ListMetalOptions {
        limit: 1,
        ..Default::default()
    };
    let ctx = CancellationToken::new();
    client.list_metal(&ctx, &opts).await.unwrap();

    client
        .set_base_url(&format!("{}/v2", second.uri()))
        .unwrap()
        .set_authorization("rotated-key");
    client.list_metal(&ctx, &opts).await.unwrap();

    let requests = second.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        "Bearer rotated-key"
    );
}
