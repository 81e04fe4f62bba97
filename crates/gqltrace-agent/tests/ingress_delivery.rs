//! 에이전트 + 실제 HTTP 전송기 통합 테스트 (mockito 수집 서버)

use chrono::{Duration as ChronoDuration, Utc};
use gqltrace_agent::{AddTraceRequest, TraceAgent};
use gqltrace_core::config::AgentConfig;
use gqltrace_core::error::CoreError;
use gqltrace_core::models::trace::Trace;
use gqltrace_core::ports::signature::QueryDocument;
use parking_lot::Mutex;
use std::sync::Arc;

const INGRESS_PATH: &str = "/api/ingress/traces";

fn config(server: &mockito::ServerGuard) -> AgentConfig {
    AgentConfig {
        api_key: Some("service:integration".to_string()),
        endpoint_url: server.url(),
        minimum_retry_delay_ms: 1,
        handle_signals: false,
        ..AgentConfig::default_config()
    }
}

fn request(schema_id: &str) -> AddTraceRequest {
    let end = Utc::now();
    AddTraceRequest::new(schema_id, "h1", Trace::new(end - ChronoDuration::milliseconds(3), end))
        .with_operation_name("GetUser")
        .with_document(QueryDocument::new("query GetUser { user { id } }"))
}

#[tokio::test]
async fn buffered_traces_reach_ingress_with_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", INGRESS_PATH)
        .match_header("x-api-key", "service:integration")
        .match_header("content-encoding", "gzip")
        .match_header("content-type", "application/protobuf")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let agent = TraceAgent::builder(config(&server))
        .env_lookup(Arc::new(|_: &str| None))
        .build()
        .unwrap();

    agent.add_trace(request("schema-a")).await.unwrap();
    agent.add_trace(request("schema-a")).await.unwrap();
    agent.add_trace(request("schema-b")).await.unwrap();
    assert_eq!(agent.stats().pending_traces, 3);

    agent.send_all_reports().await.unwrap();
    assert_eq!(agent.stats().pending_traces, 0);
    mock.assert_async().await;

    agent.stop();
}

#[tokio::test]
async fn immediate_mode_retries_server_errors_then_fails() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", INGRESS_PATH)
        .with_status(502)
        .expect(2)
        .create_async()
        .await;

    let config = AgentConfig {
        send_reports_immediately: true,
        max_attempts: 2,
        ..config(&server)
    };
    let agent = TraceAgent::builder(config)
        .env_lookup(Arc::new(|_: &str| None))
        .build()
        .unwrap();

    let err = agent.add_trace(request("schema-a")).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Transport {
            status: Some(502),
            ..
        }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn background_rejection_reported_to_hook_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", INGRESS_PATH)
        .with_status(401)
        .with_body("invalid api key")
        .expect(1)
        .create_async()
        .await;

    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let hook_seen = seen.clone();
    let config = AgentConfig {
        max_uncompressed_report_size: 1,
        ..config(&server)
    };
    let agent = TraceAgent::builder(config)
        .env_lookup(Arc::new(|_: &str| None))
        .error_hook(Arc::new(move |e: &CoreError| hook_seen.lock().push(e.to_string())))
        .build()
        .unwrap();

    agent.add_trace(request("schema-a")).await.unwrap();

    for _ in 0..200 {
        if !seen.lock().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let messages = seen.lock().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("401"));
    assert!(messages[0].contains("invalid api key"));
    mock.assert_async().await;
}
