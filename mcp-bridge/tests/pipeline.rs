//! End-to-end proxy tests: byte input → queue → mock MCP server → output.

use serde_json::json;
use tokio::io::AsyncReadExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_bridge::bridge::{ProxySummary, run_proxy};
use mcp_bridge::error::BridgeError;
use mcp_bridge_core::{ConnectionConfig, HttpDispatcher, LineSink};

// ─────────────────────────────────────────────────────────────────────────────
// Test Harness
// ─────────────────────────────────────────────────────────────────────────────

fn dispatcher(server: &MockServer) -> HttpDispatcher {
    HttpDispatcher::new(ConnectionConfig {
        url: format!("{}/mcp", server.uri()),
        token: "tok".to_string(),
        email: "dev@example.com".to_string(),
    })
    .unwrap()
}

/// Run the proxy over `input` and return its summary and everything written
/// to the output.
async fn run(server: &MockServer, input: &'static [u8]) -> (ProxySummary, String) {
    let (writer, mut reader) = tokio::io::duplex(64 * 1024);
    let collector = tokio::spawn(async move {
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        out
    });

    let summary = run_proxy(input, LineSink::new(writer), dispatcher(server))
        .await
        .unwrap();
    let out = collector.await.unwrap();
    (summary, out)
}

async fn mount_responses(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"id": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#,
            "application/json",
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"id": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n",
                "data: [DONE]\n\n",
                "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":\"ok\"}\n\n",
            ),
            "text/event-stream",
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"id": 3})))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(server)
        .await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mixed_session() {
    let server = MockServer::start().await;
    mount_responses(&server).await;

    let input: &[u8] = concat!(
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n",
        "this is not json\n",
        "\n",
        "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"fails\"}\n",
    )
    .as_bytes();

    let (summary, out) = run(&server, input).await;

    assert_eq!(summary.ingest.enqueued, 3);
    assert_eq!(summary.ingest.rejected, 1);
    assert_eq!(summary.drain.dispatched, 3);
    assert_eq!(summary.drain.failed, 1);
    assert_eq!(summary.drain.lines_emitted, 3);

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#,
            r#"{"jsonrpc":"2.0","id":2,"result":"ok"}"#,
        ]
    );

    let requests = server.received_requests().await.unwrap();
    let ids: Vec<serde_json::Value> = requests
        .iter()
        .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap()["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_requests_carry_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer tok"))
        .and(header("x-user-email", "dev@example.com"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let input: &[u8] = concat!(
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/cancelled\",\"params\":{}}\n",
    )
    .as_bytes();

    let (summary, out) = run(&server, input).await;
    assert_eq!(summary.drain.dispatched, 2);
    assert_eq!(summary.drain.failed, 0);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_request_body_is_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let input: &[u8] =
        b"{\"jsonrpc\":\"2.0\",\"id\":\"abc\",\"method\":\"m\",\"params\":{\"z\":1,\"a\":null},\"_meta\":true}\n";
    run(&server, input).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({
            "jsonrpc": "2.0",
            "id": "abc",
            "method": "m",
            "params": {"z": 1, "a": null},
            "_meta": true,
        })
    );
}

#[tokio::test]
async fn test_request_body_keeps_member_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    run(&server, b"{\"method\":\"m\",\"id\":1,\"jsonrpc\":\"2.0\"}\n").await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        String::from_utf8_lossy(&requests[0].body),
        r#"{"method":"m","id":1,"jsonrpc":"2.0"}"#
    );
}

#[tokio::test]
async fn test_batches_and_versionless_objects_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let input: &[u8] = concat!(
        "[{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}]\n",
        "{\"id\":2,\"method\":\"ping\"}\n",
    )
    .as_bytes();

    let (summary, _out) = run(&server, input).await;
    assert_eq!(summary.ingest.enqueued, 2);
    assert_eq!(summary.ingest.rejected, 0);

    let bodies: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect();
    assert_eq!(
        bodies,
        vec![
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#,
            r#"{"id":2,"method":"ping"}"#,
        ]
    );
}

#[tokio::test]
async fn test_unterminated_last_line_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let input: &[u8] = concat!(
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"b\"}",
    )
    .as_bytes();

    let (summary, _out) = run(&server, input).await;
    assert_eq!(summary.ingest.enqueued, 1);
    assert_eq!(summary.drain.dispatched, 1);
}

#[tokio::test]
async fn test_unreachable_server_keeps_draining() {
    let dispatcher = HttpDispatcher::new(ConnectionConfig {
        url: "http://127.0.0.1:1/mcp".to_string(),
        token: "tok".to_string(),
        email: "dev@example.com".to_string(),
    })
    .unwrap();

    let input: &[u8] = concat!(
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"b\"}\n",
    )
    .as_bytes();

    let summary = run_proxy(input, LineSink::new(tokio::io::sink()), dispatcher)
        .await
        .unwrap();
    assert_eq!(summary.drain.dispatched, 2);
    assert_eq!(summary.drain.failed, 2);
}

#[tokio::test]
async fn test_closed_output_is_fatal() {
    let server = MockServer::start().await;
    mount_responses(&server).await;

    let (writer, reader) = tokio::io::duplex(64);
    drop(reader);

    let input: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n";
    let result = run_proxy(input, LineSink::new(writer), dispatcher(&server)).await;
    assert!(matches!(result, Err(BridgeError::Output(_))));
}
