#[cfg(test)]
mod tests {
    use crate::agents::agent::*;
    use crate::agents::session::{AgentSession, SessionSettings};
    use crate::error::{Result, ShowcaseError};
    use crate::protocol::{Envelope, MessageType};
    use async_trait::async_trait;
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::Message;

    /// Echoes its payload back; fails when asked to.
    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        fn descriptor(&self) -> AgentDescriptor {
            AgentDescriptor::new("echo_agent", "Echoes payloads", &["echo"])
        }

        async fn process(&self, request: Value) -> Result<Value> {
            if request.get("fail").is_some() {
                return Err(ShowcaseError::AgentError("asked to fail".to_string()).into());
            }
            Ok(json!({"echo": request, "status": "success"}))
        }
    }

    fn settings(ws_url: &str, reconnect_attempts: u32) -> SessionSettings {
        SessionSettings {
            ws_url: ws_url.to_string(),
            auth_header: "x-custom-authorization".to_string(),
            token: Some("jwt-token".to_string()),
            reconnect_attempts,
        }
    }

    fn session() -> AgentSession {
        AgentSession::new(Arc::new(EchoAgent), settings("ws://127.0.0.1:1/ws", 0))
    }

    #[tokio::test]
    async fn test_invocation_gets_response() {
        let session = session();
        let frame = Envelope::invoke("flow-1", json!({"text": "hello"})).to_json().unwrap();

        let reply = session.handle_frame(&frame).await.unwrap();
        assert_eq!(reply.message_type, MessageType::AgentResponse);
        assert_eq!(reply.invoked_by.as_deref(), Some("flow-1"));
        assert_eq!(reply.request_payload.unwrap()["echo"]["text"], "hello");

        let metrics = session.metrics().await;
        assert_eq!(metrics.invocations, 1);
        assert_eq!(metrics.failures, 0);
        assert!(metrics.last_invocation.is_some());
    }

    #[tokio::test]
    async fn test_failure_with_caller_gets_agent_error() {
        let session = session();
        let frame = Envelope::invoke("flow-2", json!({"fail": true})).to_json().unwrap();

        let reply = session.handle_frame(&frame).await.unwrap();
        assert_eq!(reply.message_type, MessageType::AgentError);
        let error = reply.error.unwrap();
        assert_eq!(error.agent, "echo_agent");
        assert_eq!(error.error_message, "Processing failed: Agent error: asked to fail");
        assert_eq!(session.metrics().await.failures, 1);
    }

    #[tokio::test]
    async fn test_failure_without_caller_is_silent() {
        let session = session();
        let frame = r#"{"message_type":"agent_invoke","request_payload":{"fail":true}}"#;
        assert!(session.handle_frame(frame).await.is_none());
        assert_eq!(session.metrics().await.failures, 1);
    }

    #[tokio::test]
    async fn test_system_and_invalid_frames_are_ignored() {
        let session = session();
        assert!(session.handle_frame(r#"{"message_type":"welcome"}"#).await.is_none());
        assert!(session.handle_frame(r#"{"message_type":"agent_invoke"}"#).await.is_none());
        assert!(session.handle_frame("{not json").await.is_none());
        assert_eq!(session.metrics().await.invocations, 0);
    }

    #[tokio::test]
    async fn test_run_agent_folds_errors() {
        let ok = run_agent(&EchoAgent, json!({"a": 1})).await;
        assert_eq!(ok["echo"]["a"], 1);

        let failed = run_agent(&EchoAgent, json!({"fail": true})).await;
        assert!(is_error(&failed));
        assert_eq!(failed["agent"], "echo_agent");
        assert_eq!(failed["error"], "Agent error: asked to fail");
    }

    #[test]
    fn test_request_carries_auth_header() {
        let request = session().request().unwrap();
        assert_eq!(request.headers()["x-custom-authorization"], "jwt-token");
    }

    #[tokio::test]
    async fn test_session_registers_and_answers_router() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen_token = Arc::new(Mutex::new(None::<String>));

        let router_token = seen_token.clone();
        let router = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, |req: &Request, resp: Response| {
                let token = req
                    .headers()
                    .get("x-custom-authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                *router_token.lock().unwrap() = token;
                Ok::<Response, ErrorResponse>(resp)
            })
            .await
            .unwrap();

            let register = ws.next().await.unwrap().unwrap().into_text().unwrap();
            let invoke = Envelope::invoke("user-9", json!({"x": 1})).to_json().unwrap();
            ws.send(Message::Text(invoke)).await.unwrap();
            let response = ws.next().await.unwrap().unwrap().into_text().unwrap();
            ws.close(None).await.unwrap();
            (register, response)
        });

        let session = Arc::new(AgentSession::new(
            Arc::new(EchoAgent),
            settings(&format!("ws://{}/ws", addr), 0),
        ));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let running = session.clone();
        let handle = tokio::spawn(async move { running.run(shutdown_rx).await });

        let (register, response) = timeout(Duration::from_secs(5), router).await.unwrap().unwrap();

        let register = Envelope::parse(&register).unwrap();
        assert_eq!(register.message_type, MessageType::AgentRegister);
        assert_eq!(register.request_payload.unwrap()["agent_name"], "echo_agent");

        let response = Envelope::parse(&response).unwrap();
        assert_eq!(response.message_type, MessageType::AgentResponse);
        assert_eq!(response.invoked_by.as_deref(), Some("user-9"));
        assert_eq!(seen_token.lock().unwrap().as_deref(), Some("jwt-token"));

        // the router closed first, so the session may already have stopped
        let _ = shutdown_tx.send(()).await;
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
        assert_eq!(session.status().await, AgentStatus::Stopped);
    }

    #[tokio::test]
    async fn test_unreachable_router_without_reconnect_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let session = AgentSession::new(Arc::new(EchoAgent), settings(&format!("ws://{}/ws", addr), 0));
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let err = timeout(Duration::from_secs(5), session.run(shutdown_rx)).await.unwrap().unwrap_err();
        assert!(err.to_string().contains("gave up after 0 reconnect attempts"));
        assert!(matches!(session.status().await, AgentStatus::Error(_)));
    }
}
