use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{FlowBackend, FlowStatus};
use crate::agents::agent::AgentDescriptor;
use crate::config::BackendConfig;
use crate::error::{Result, ShowcaseError};

const LOGIN_ENDPOINTS: &[&str] = &[
    "/api/v1/users/login_access_token",
    "/api/v1/auth/login",
    "/api/login/access-token",
];

const REGISTER_ENDPOINTS: &[&str] = &["/api/v1/agents/register", "/api/v1/agents", "/agents/register"];

const LIST_ENDPOINTS: &[&str] = &["/api/v1/agents", "/api/v1/agents/active", "/agents"];

/// REST client for the platform backend. The bearer token is kept after
/// login and attached to every later call.
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

fn already_exists(status: StatusCode, body: &str) -> bool {
    status == StatusCode::BAD_REQUEST && body.to_lowercase().contains("exists")
}

/// Reads `key` as a string, accepting numeric ids too.
fn id_field(body: &Value, key: &str) -> Result<String> {
    match &body[key] {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ShowcaseError::ParseError(format!("Response has no {}: {}", key, body)).into()),
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ShowcaseError::BackendError {
        status: status.as_u16(),
        body,
    }
    .into())
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ShowcaseError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// Creates the user; an existing user is not an error. Returns whether a
    /// new user was created.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<bool> {
        let response = self
            .client
            .post(self.url("/api/v1/auth/register"))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .map_err(ShowcaseError::from)?;

        let status = response.status();
        if status.is_success() {
            info!("Created user {}", username);
            return Ok(true);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST || body.to_lowercase().contains("exists") {
            info!("User {} already exists", username);
            return Ok(false);
        }
        Err(ShowcaseError::BackendError {
            status: status.as_u16(),
            body,
        }
        .into())
    }

    /// Registers an agent through the first endpoint that accepts it and
    /// returns that endpoint.
    pub async fn register_agent(&self, descriptor: &AgentDescriptor) -> Result<String> {
        let mut payload = serde_json::to_value(descriptor)?;
        payload["name"] = json!(descriptor.agent_name);
        payload["description"] = json!(descriptor.agent_description);

        let mut last = None;
        for endpoint in REGISTER_ENDPOINTS {
            let request = self.authorized(self.client.post(self.url(endpoint)).json(&payload)).await;
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Failed {} for {}: {}", endpoint, descriptor.agent_name, e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                info!("Registered {} via {}", descriptor.agent_name, endpoint);
                return Ok(endpoint.to_string());
            }
            let body = response.text().await.unwrap_or_default();
            if already_exists(status, &body) {
                info!("{} already registered", descriptor.agent_name);
                return Ok(endpoint.to_string());
            }
            debug!("{} rejected {}: {}", endpoint, descriptor.agent_name, status);
            last = Some((status.as_u16(), body));
        }

        let (status, body) = last.unwrap_or((0, "no endpoint reachable".to_string()));
        Err(ShowcaseError::BackendError {
            status,
            body: format!("Could not register {}: {}", descriptor.agent_name, body),
        }
        .into())
    }

    /// Agents known to the backend, from the first endpoint that lists any.
    pub async fn list_agents(&self) -> Result<Vec<Value>> {
        for endpoint in LIST_ENDPOINTS {
            let request = self.authorized(self.client.get(self.url(endpoint))).await;
            let Ok(response) = request.send().await else {
                continue;
            };
            if !response.status().is_success() {
                continue;
            }
            if let Ok(Value::Array(agents)) = response.json::<Value>().await {
                if !agents.is_empty() {
                    debug!("Found {} agents via {}", agents.len(), endpoint);
                    return Ok(agents);
                }
            }
        }
        Ok(Vec::new())
    }

    pub async fn health(&self) -> Result<Value> {
        let response = check(self.client.get(self.url("/health")).send().await.map_err(ShowcaseError::from)?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl FlowBackend for BackendClient {
    async fn login(&self, username: &str, password: &str) -> Result<String> {
        let mut last_status = StatusCode::UNAUTHORIZED;
        for endpoint in LOGIN_ENDPOINTS {
            let response = match self
                .client
                .post(self.url(endpoint))
                .form(&[("username", username), ("password", password)])
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    debug!("Login via {} failed: {}", endpoint, e);
                    continue;
                }
            };

            last_status = response.status();
            if last_status != StatusCode::OK {
                continue;
            }
            let body: Value = response.json().await.unwrap_or_default();
            if let Some(token) = body["access_token"].as_str().filter(|t| !t.is_empty()) {
                info!("Authenticated via {}", endpoint);
                self.set_token(token).await;
                return Ok(token.to_string());
            }
        }

        Err(ShowcaseError::BackendError {
            status: last_status.as_u16(),
            body: "Could not authenticate with any endpoint".to_string(),
        }
        .into())
    }

    async fn upload_file(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ShowcaseError::DocumentError(format!("Cannot read {}: {}", path.display(), e)))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        info!("Uploading document: {}", filename);
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename));
        let request = self.authorized(self.client.post(self.url("/api/v1/files/upload"))).await;
        let response = check(request.multipart(form).send().await.map_err(ShowcaseError::from)?).await?;

        let file_id = id_field(&response.json().await?, "file_id")?;
        info!("Document uploaded (ID: {})", file_id);
        Ok(file_id)
    }

    async fn execute_flow(&self, definition: &Value) -> Result<String> {
        let request = self.authorized(self.client.post(self.url("/api/v1/flows/execute"))).await;
        let response = check(request.json(definition).send().await.map_err(ShowcaseError::from)?).await?;
        let flow_id = id_field(&response.json().await?, "flow_id")?;
        info!("Flow started (ID: {})", flow_id);
        Ok(flow_id)
    }

    async fn flow_status(&self, flow_id: &str) -> Result<FlowStatus> {
        let path = format!("/api/v1/flows/{}/status", flow_id);
        let request = self.authorized(self.client.get(self.url(&path))).await;
        let response = check(request.send().await.map_err(ShowcaseError::from)?).await?;
        Ok(response.json().await?)
    }

    async fn flow_results(&self, flow_id: &str) -> Result<Value> {
        let path = format!("/api/v1/flows/{}/results", flow_id);
        let request = self.authorized(self.client.get(self.url(&path))).await;
        let response = check(request.send().await.map_err(ShowcaseError::from)?).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::time::Duration;
    use tempfile::tempdir;

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    async fn fake_backend() -> String {
        let app = Router::new()
            // the first login endpoint is missing on purpose
            .route(
                "/api/v1/auth/login",
                post(|body: String| async move {
                    if body.contains("username=demo") {
                        (StatusCode::OK, Json(json!({"access_token": "tok-1", "token_type": "bearer"})))
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({"detail": "bad credentials"})))
                    }
                }),
            )
            .route(
                "/api/v1/files/upload",
                post(|headers: HeaderMap, body: Bytes| async move {
                    let named = String::from_utf8_lossy(&body).contains("filename=\"memo.txt\"");
                    if bearer(&headers).as_deref() == Some("Bearer tok-1") && named {
                        (StatusCode::OK, Json(json!({"file_id": 42})))
                    } else {
                        (StatusCode::FORBIDDEN, Json(json!({"detail": "forbidden"})))
                    }
                }),
            )
            .route(
                "/api/v1/auth/register",
                post(|| async { (StatusCode::BAD_REQUEST, "User already exists") }),
            )
            .route(
                "/api/v1/agents/register",
                post(|| async { (StatusCode::BAD_REQUEST, "Agent already exists") }),
            )
            .route("/api/v1/agents", get(|| async { Json(json!([])) }))
            .route(
                "/api/v1/agents/active",
                get(|| async { Json(json!([{"name": "text_extractor"}])) }),
            )
            .route(
                "/api/v1/flows/execute",
                post(|Json(flow): Json<Value>| async move {
                    Json(json!({"flow_id": format!("flow-{}", flow["agents_flow"].as_array().map_or(0, Vec::len))}))
                }),
            )
            .route(
                "/api/v1/flows/:id/status",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") }),
            )
            .route("/health", get(|| async { Json(json!({"status": "healthy"})) }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn client() -> BackendClient {
        BackendClient::new(&BackendConfig {
            url: fake_backend().await,
            username: "demo".to_string(),
            password: "demo123".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_falls_back_and_keeps_token() {
        let client = client().await;
        assert_eq!(client.login("demo", "demo123").await.unwrap(), "tok-1");
        assert_eq!(client.token().await.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_login_failure_is_backend_error() {
        let client = client().await;
        let err = client.login("intruder", "x").await.unwrap_err();
        assert!(err.to_string().contains("Could not authenticate"));
    }

    #[tokio::test]
    async fn test_upload_sends_bearer_and_reads_numeric_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        std::fs::write(&path, "Quarterly memo").unwrap();

        let client = client().await;
        client.login("demo", "demo123").await.unwrap();
        assert_eq!(client.upload_file(&path).await.unwrap(), "42");
    }

    #[tokio::test]
    async fn test_upload_without_login_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        std::fs::write(&path, "Quarterly memo").unwrap();

        let err = client().await.upload_file(&path).await.unwrap_err();
        match err.downcast_ref::<ShowcaseError>() {
            Some(ShowcaseError::BackendError { status, .. }) => assert_eq!(*status, 403),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_existing_user_and_agent_count_as_success() {
        let client = client().await;
        assert!(!client.create_user("demo", "demo123").await.unwrap());

        let descriptor = AgentDescriptor::new("text_extractor", "Extracts entities", &["entities"]);
        assert_eq!(client.register_agent(&descriptor).await.unwrap(), "/api/v1/agents/register");
    }

    #[tokio::test]
    async fn test_list_agents_skips_empty_endpoints() {
        let agents = client().await.list_agents().await.unwrap();
        assert_eq!(agents, vec![json!({"name": "text_extractor"})]);
    }

    #[tokio::test]
    async fn test_flow_calls() {
        let client = client().await;
        let flow_id = client
            .execute_flow(&json!({"agents_flow": [{}, {}, {}]}))
            .await
            .unwrap();
        assert_eq!(flow_id, "flow-3");

        let err = client.flow_status(&flow_id).await.unwrap_err();
        assert_eq!(err.to_string(), "Backend returned 500: database down");

        assert_eq!(client.health().await.unwrap()["status"], "healthy");
    }
}
