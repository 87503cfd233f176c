use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum ShowcaseError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Backend returned {status}: {body}")]
    BackendError { status: u16, body: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Report error: {0}")]
    ReportError(String),
}

#[derive(Debug, PartialEq)]
pub enum RecoveryStrategy {
    RetryWithBackoff,
    Reconnect,
    LogAndContinue,
    ReloadConfig,
    RestartAgent,
    Abort,
}

impl ShowcaseError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ShowcaseError::NetworkError(_) => RecoveryStrategy::RetryWithBackoff,
            ShowcaseError::ProtocolError(_) => RecoveryStrategy::Reconnect,
            ShowcaseError::ParseError(_) => RecoveryStrategy::LogAndContinue,
            ShowcaseError::DocumentError(_) => RecoveryStrategy::LogAndContinue,
            ShowcaseError::BackendError { status, .. } if *status == 429 || *status >= 500 => {
                RecoveryStrategy::RetryWithBackoff
            }
            ShowcaseError::BackendError { .. } => RecoveryStrategy::Abort,
            ShowcaseError::StorageError(_) => RecoveryStrategy::Abort,
            ShowcaseError::ConfigError(_) => RecoveryStrategy::ReloadConfig,
            ShowcaseError::AgentError(_) => RecoveryStrategy::RestartAgent,
            ShowcaseError::ReportError(_) => RecoveryStrategy::LogAndContinue,
        }
    }
}

// conversions for the error types that show up at the edges
impl From<std::io::Error> for ShowcaseError {
    fn from(err: std::io::Error) -> Self {
        ShowcaseError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ShowcaseError {
    fn from(err: serde_json::Error) -> Self {
        ShowcaseError::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for ShowcaseError {
    fn from(err: toml::de::Error) -> Self {
        ShowcaseError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ShowcaseError {
    fn from(err: reqwest::Error) -> Self {
        ShowcaseError::NetworkError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ShowcaseError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ShowcaseError::ProtocolError(err.to_string())
    }
}

impl From<zip::result::ZipError> for ShowcaseError {
    fn from(err: zip::result::ZipError) -> Self {
        ShowcaseError::DocumentError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_recovery_depends_on_status() {
        let throttled = ShowcaseError::BackendError { status: 429, body: String::new() };
        let rejected = ShowcaseError::BackendError { status: 401, body: "bad token".into() };

        assert_eq!(throttled.recovery_strategy(), RecoveryStrategy::RetryWithBackoff);
        assert_eq!(rejected.recovery_strategy(), RecoveryStrategy::Abort);
        assert_eq!(rejected.to_string(), "Backend returned 401: bad token");
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let err: ShowcaseError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ShowcaseError::StorageError(_)));
    }
}
