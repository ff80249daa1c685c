//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use director_core::a2a::{AgentCapabilities, AgentCard, AgentSkill};
use director_core::{Config, Director};

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub director: Director,
    pub card: Arc<AgentCard>,
}

impl AppState {
    pub fn new(director: Director, card: AgentCard) -> Self {
        Self {
            director,
            card: Arc::new(card),
        }
    }
}

/// Agent card advertised at `/.well-known/agent.json`
pub fn director_card(config: &Config) -> AgentCard {
    let modes = vec!["text".to_string(), "text/plain".to_string()];

    AgentCard {
        name: "Director Agent".to_string(),
        description: "Routes each question to the specialised agent best suited to answer it"
            .to_string(),
        url: config.public_url(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_input_modes: modes.clone(),
        default_output_modes: modes,
        capabilities: AgentCapabilities {
            streaming: true,
            push_notifications: false,
        },
        skills: vec![AgentSkill {
            id: "direct_user_query".to_string(),
            name: "Direct user query".to_string(),
            description: "Selects a downstream agent and streams its answer".to_string(),
            tags: vec!["routing".to_string(), "orchestration".to_string()],
            examples: vec!["What is widget 1?".to_string()],
        }],
    }
}

/// Build the router with all layers
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP API server
pub async fn start_server(config: &Config, director: Director) -> anyhow::Result<()> {
    let state = AppState::new(director, director_card(config));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", listener.local_addr()?);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use director_core::agents::testing::{MockClassifier, ScriptedTransport};
    use director_core::agents::RawDownstreamEvent;
    use director_core::{
        AgentDescriptor, AgentRegistry, AgentSelector, DelegationClient, DelegationConfig,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_app(classifier: MockClassifier, transport: Arc<ScriptedTransport>) -> Router {
        let director = Director::new(
            AgentRegistry::new([AgentDescriptor::new("widgets", "http://widgets")]),
            AgentSelector::new(Arc::new(classifier)),
            DelegationClient::new(transport, &DelegationConfig::default()),
        )
        .with_trailer_grace(Duration::from_millis(20));

        app(AppState::new(director, director_card(&Config::default())))
    }

    fn widgets_app(transport: Arc<ScriptedTransport>) -> Router {
        test_app(MockClassifier::answering(Some("widgets")), transport)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", "Bearer abc123")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = widgets_app(Arc::new(ScriptedTransport::new(vec![])));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn test_agent_card() {
        let app = widgets_app(Arc::new(ScriptedTransport::new(vec![])));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/.well-known/agent.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let card: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(card["name"], "Director Agent");
        assert_eq!(card["capabilities"]["streaming"], true);
        assert_eq!(card["skills"][0]["id"], "direct_user_query");
        assert_eq!(card["url"], "http://localhost:10010/");
    }

    #[tokio::test]
    async fn test_stream_emits_sse_events() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            RawDownstreamEvent::StatusUpdate("thinking".into()),
            RawDownstreamEvent::ContentChunk {
                text: "Force is 10N".into(),
                content_type: "text/plain".into(),
            },
            RawDownstreamEvent::TerminalSuccess("Force is 10N".into()),
        ]));
        let app = widgets_app(transport.clone());

        let response = app
            .oneshot(post_json(
                "/api/stream",
                serde_json::json!({"query": "What force?", "session_id": "s1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = body_string(response).await;
        let working = body.find("event: working").unwrap();
        let chunk = body.find("event: content_chunk").unwrap();
        let completed = body.find("event: completed").unwrap();
        assert!(working < chunk && chunk < completed);
        assert!(body.contains("\"message\":\"Force is 10N\""));
        assert!(!body.contains("abc123"));

        let opened = transport.opened();
        assert_eq!(opened[0].credential.as_deref(), Some("Bearer abc123"));
        assert_eq!(opened[0].session_id, "s1");
    }

    #[tokio::test]
    async fn test_stream_generates_session_id() {
        let transport = Arc::new(ScriptedTransport::new(vec![RawDownstreamEvent::TerminalSuccess(
            "ok".into(),
        )]));
        let app = widgets_app(transport.clone());

        let response = app
            .oneshot(post_json("/api/stream", serde_json::json!({"query": "q"})))
            .await
            .unwrap();
        let _ = body_string(response).await;

        let session_id = &transport.opened()[0].session_id;
        assert!(uuid::Uuid::parse_str(session_id).is_ok());
    }

    #[tokio::test]
    async fn test_stream_unresolved_is_failed_event() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let app = test_app(MockClassifier::answering(None), transport.clone());

        let response = app
            .oneshot(post_json("/api/stream", serde_json::json!({"query": "q"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("event: failed"));
        assert!(body.contains("\"reason\":\"Unresolved\""));
        assert!(transport.opened().is_empty());
    }

    #[tokio::test]
    async fn test_stream_rejects_empty_query() {
        let app = widgets_app(Arc::new(ScriptedTransport::new(vec![])));
        let response = app
            .oneshot(post_json("/api/stream", serde_json::json!({"query": "  "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invoke_is_not_implemented() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let classifier = MockClassifier::answering(Some("widgets"));
        let app = test_app(classifier, transport.clone());

        let response = app
            .oneshot(post_json("/api/invoke", serde_json::json!({"query": "q"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "NotSupportedError");
        assert!(transport.opened().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_refuses_before_reading_body() {
        for body in ["{not json", r#"{"query": ""}"#] {
            let app = widgets_app(Arc::new(ScriptedTransport::new(vec![])));
            let request = Request::builder()
                .method("POST")
                .uri("/api/invoke")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap();

            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        }
    }

    fn rpc_request(method: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 42,
            "method": method,
            "params": {"message": {"role": "user", "messageId": "m1", "contextId": "s1",
                                   "parts": [{"kind": "text", "text": text}]}}
        })
    }

    /// `data:` payloads of an SSE body
    fn sse_payloads(body: &str) -> Vec<serde_json::Value> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_rpc_message_stream() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            RawDownstreamEvent::StatusUpdate("thinking".into()),
            RawDownstreamEvent::TerminalSuccess("Force is 10N".into()),
        ]));
        let app = widgets_app(transport.clone());

        let response = app
            .oneshot(post_json("/", rpc_request("message/stream", "What force?")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = body_string(response).await;
        assert!(!body.contains("abc123"));
        let payloads = sse_payloads(&body);
        let kinds: Vec<&str> = payloads
            .iter()
            .map(|p| p["result"]["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["task", "status-update", "artifact-update", "status-update"]);

        assert!(payloads.iter().all(|p| p["id"] == 42 && p["jsonrpc"] == "2.0"));
        assert_eq!(payloads[1]["result"]["status"]["state"], "working");
        assert_eq!(payloads[2]["result"]["artifact"]["parts"][0]["text"], "Force is 10N");
        assert_eq!(payloads[3]["result"]["status"]["state"], "completed");
        assert_eq!(payloads[3]["result"]["final"], true);
        assert_eq!(payloads[3]["result"]["contextId"], "s1");

        let opened = transport.opened();
        assert_eq!(opened[0].session_id, "s1");
        assert_eq!(opened[0].credential.as_deref(), Some("Bearer abc123"));
    }

    #[tokio::test]
    async fn test_rpc_unresolved_is_final_failed_status() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let app = test_app(MockClassifier::answering(None), transport.clone());

        let response = app
            .oneshot(post_json("/", rpc_request("message/stream", "q")))
            .await
            .unwrap();

        let payloads = sse_payloads(&body_string(response).await);
        let last = &payloads[payloads.len() - 1]["result"];
        assert_eq!(last["status"]["state"], "failed");
        assert_eq!(last["final"], true);
        assert!(last["status"]["message"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Unresolved"));
        assert!(transport.opened().is_empty());
    }

    #[tokio::test]
    async fn test_rpc_errors() {
        let cases = [
            (rpc_request("tasks/get", "q"), -32601),
            (rpc_request("message/send", "q"), -32004),
            (rpc_request("message/stream", "  "), -32602),
            (serde_json::json!({"jsonrpc": "2.0", "id": 1}), -32600),
        ];

        for (request, code) in cases {
            let transport = Arc::new(ScriptedTransport::new(vec![]));
            let app = widgets_app(transport.clone());
            let response = app.oneshot(post_json("/", request)).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["error"]["code"], code);
            assert!(transport.opened().is_empty());
        }

        let app = widgets_app(Arc::new(ScriptedTransport::new(vec![])));
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], serde_json::Value::Null);
    }
}
