use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::agents::agent::AgentDescriptor;
use crate::error::{Result, ShowcaseError};

/// Router message kinds. Anything unknown is kept verbatim and treated as a
/// system message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    AgentRegister,
    AgentInvoke,
    AgentResponse,
    AgentError,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::AgentRegister => "agent_register",
            MessageType::AgentInvoke => "agent_invoke",
            MessageType::AgentResponse => "agent_response",
            MessageType::AgentError => "agent_error",
            MessageType::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for MessageType {
    fn from(value: &str) -> Self {
        match value {
            "agent_register" => MessageType::AgentRegister,
            "agent_invoke" => MessageType::AgentInvoke,
            "agent_response" => MessageType::AgentResponse,
            "agent_error" => MessageType::AgentError,
            other => MessageType::Other(other.to_string()),
        }
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MessageType::from(raw.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_message: String,
    pub agent: String,
}

/// The JSON frame exchanged with the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn register(descriptor: &AgentDescriptor) -> Result<Self> {
        Ok(Self {
            message_type: MessageType::AgentRegister,
            request_payload: Some(serde_json::to_value(descriptor)?),
            invoked_by: None,
            error: None,
        })
    }

    pub fn response(invoked_by: Option<String>, payload: Value) -> Self {
        Self {
            message_type: MessageType::AgentResponse,
            request_payload: Some(payload),
            invoked_by,
            error: None,
        }
    }

    pub fn error(invoked_by: Option<String>, agent: &str, message: impl std::fmt::Display) -> Self {
        Self {
            message_type: MessageType::AgentError,
            request_payload: None,
            invoked_by,
            error: Some(ErrorBody {
                error_message: format!("Processing failed: {}", message),
                agent: agent.to_string(),
            }),
        }
    }

    pub fn invoke(invoked_by: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: MessageType::AgentInvoke,
            request_payload: Some(payload),
            invoked_by: Some(invoked_by.into()),
            error: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ShowcaseError::ProtocolError(format!("Invalid envelope: {}", e)).into())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// An invocation the agent should act on: `agent_invoke` carrying a payload.
    pub fn is_invocation(&self) -> bool {
        self.message_type == MessageType::AgentInvoke && self.request_payload.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor {
            agent_name: "text_extractor".to_string(),
            agent_description: "Extracts entities".to_string(),
            agent_version: "1.0.0".to_string(),
            capabilities: vec!["entity_extraction".to_string()],
        }
    }

    #[test]
    fn test_register_frame_shape() {
        let frame = Envelope::register(&descriptor()).unwrap();
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(value["message_type"], "agent_register");
        assert_eq!(value["request_payload"]["agent_name"], "text_extractor");
        assert_eq!(value["request_payload"]["capabilities"][0], "entity_extraction");
        assert!(value.get("invoked_by").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_frame_prefixes_message() {
        let frame = Envelope::error(Some("flow-7".into()), "analytics_agent", "boom");
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["message_type"], "agent_error");
        assert_eq!(value["invoked_by"], "flow-7");
        assert_eq!(value["error"]["error_message"], "Processing failed: boom");
        assert_eq!(value["error"]["agent"], "analytics_agent");
        assert!(value.get("request_payload").is_none());
    }

    #[test]
    fn test_unknown_message_type_is_kept() {
        let frame = Envelope::parse(r#"{"message_type":"heartbeat"}"#).unwrap();
        assert_eq!(frame.message_type, MessageType::Other("heartbeat".into()));
        assert!(!frame.is_invocation());
    }

    #[test]
    fn test_invoke_without_payload_is_not_an_invocation() {
        let bare = Envelope::parse(r#"{"message_type":"agent_invoke","invoked_by":"u1"}"#).unwrap();
        assert!(!bare.is_invocation());

        let full = Envelope::invoke("u1", json!({"full_text": "hi"}));
        assert!(full.is_invocation());
    }

    #[test]
    fn test_invalid_json_is_protocol_error() {
        let err = Envelope::parse("not json").unwrap_err();
        assert!(matches!(err.downcast_ref::<ShowcaseError>(), Some(ShowcaseError::ProtocolError(_))));
    }
}
