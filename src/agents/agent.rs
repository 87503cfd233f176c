use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{error, info};

use crate::error::{Result, ShowcaseError};

pub const AGENT_VERSION: &str = "1.0.0";

/// What an agent tells the router about itself when it registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_name: String,
    pub agent_description: String,
    pub agent_version: String,
    pub capabilities: Vec<String>,
}

impl AgentDescriptor {
    pub fn new(name: &str, description: &str, capabilities: &[&str]) -> Self {
        Self {
            agent_name: name.to_string(),
            agent_description: description.to_string(),
            agent_version: AGENT_VERSION.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AgentStatus {
    Idle,
    Connecting,
    Active,
    Reconnecting,
    Stopped,
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub invocations: u64,
    pub failures: u64,
    pub reconnects: u32,
    pub uptime: Duration,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_invocation: Option<DateTime<Utc>>,
    pub status: AgentStatus,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            invocations: 0,
            failures: 0,
            reconnects: 0,
            uptime: Duration::from_secs(0),
            connected_at: None,
            last_invocation: None,
            status: AgentStatus::Idle,
        }
    }
}

/// A stateless JSON-in, JSON-out analysis step.
#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> AgentDescriptor;

    async fn process(&self, request: Value) -> Result<Value>;

    fn name(&self) -> String {
        self.descriptor().agent_name
    }
}

/// Runs an agent and folds any failure into the uniform error object.
pub async fn run_agent(agent: &dyn Agent, request: Value) -> Value {
    let name = agent.name();
    match agent.process(request).await {
        Ok(result) => result,
        Err(e) => {
            error!("Agent {} failed: {}", name, e);
            error_result(&name, &e.to_string())
        }
    }
}

pub fn error_result(agent: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "error": message,
        "agent": agent,
    })
}

/// True when a stage result carries `"status": "error"`.
pub fn is_error(result: &Value) -> bool {
    result.get("status").and_then(Value::as_str) == Some("error")
}

/// Stamps a successful result with the agent name, status and a timestamp
/// under `timestamp_field`.
pub fn finish(mut body: Map<String, Value>, agent: &str, timestamp_field: &str) -> Value {
    body.insert("agent".to_string(), json!(agent));
    body.insert(timestamp_field.to_string(), json!(Utc::now().to_rfc3339()));
    body.insert("status".to_string(), json!("success"));
    Value::Object(body)
}

/// Non-empty string field or an agent error with `missing_message`.
pub fn require_text<'a>(request: &'a Value, field: &str, missing_message: &str) -> Result<&'a str> {
    match request.get(field).and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ShowcaseError::AgentError(missing_message.to_string()).into()),
    }
}

pub fn object_field(request: &Value, field: &str) -> Value {
    match request.get(field) {
        Some(v @ Value::Object(_)) => v.clone(),
        _ => json!({}),
    }
}

pub fn array_field(request: &Value, field: &str) -> Vec<Value> {
    request
        .get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// First `limit` characters, for logs.
pub fn preview(text: &str, limit: usize) -> String {
    let mut out: String = text.chars().take(limit).collect();
    if text.chars().count() > limit {
        out.push_str("...");
    }
    out
}

pub fn log_received(agent: &str, text: &str) {
    info!("{} processing: {}", agent, preview(text, 100));
}
