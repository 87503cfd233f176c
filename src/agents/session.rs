use chrono::Utc;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

use crate::agents::agent::{is_error, preview, Agent, AgentStatus, SessionMetrics};
use crate::config::Config;
use crate::error::{Result, ShowcaseError};
use crate::protocol::Envelope;

const MAX_BACKOFF_EXPONENT: u32 = 5;

/// Where and how a session reaches the router.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub ws_url: String,
    pub auth_header: String,
    pub token: Option<String>,
    pub reconnect_attempts: u32,
}

impl SessionSettings {
    pub fn from_config(config: &Config, agent_name: &str) -> Self {
        Self {
            ws_url: config.router.ws_url.clone(),
            auth_header: config.router.auth_header.clone(),
            token: config.agent(agent_name).and_then(|a| a.token.clone()),
            reconnect_attempts: config.router.reconnect_attempts,
        }
    }
}

/// How one connection ended.
#[derive(Debug, PartialEq)]
enum SessionEnd {
    Shutdown,
    Closed,
}

/// 1s doubling per attempt, capped at 32s, plus up to 250ms of jitter.
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = 1000 * 2_u64.pow(attempt.min(MAX_BACKOFF_EXPONENT));
    let jitter = rand::thread_rng().gen_range(0..=250);
    Duration::from_millis(base + jitter)
}

/// Keeps one agent connected to the router and answers its invocations.
pub struct AgentSession {
    agent: Arc<dyn Agent>,
    settings: SessionSettings,
    status: Arc<RwLock<AgentStatus>>,
    metrics: Arc<RwLock<SessionMetrics>>,
    started_at: Instant,
}

impl AgentSession {
    pub fn new(agent: Arc<dyn Agent>, settings: SessionSettings) -> Self {
        Self {
            agent,
            settings,
            status: Arc::new(RwLock::new(AgentStatus::Idle)),
            metrics: Arc::new(RwLock::new(SessionMetrics::default())),
            started_at: Instant::now(),
        }
    }

    pub async fn status(&self) -> AgentStatus {
        self.status.read().await.clone()
    }

    pub async fn metrics(&self) -> SessionMetrics {
        let mut metrics = self.metrics.read().await.clone();
        metrics.uptime = self.started_at.elapsed();
        metrics.status = self.status().await;
        metrics
    }

    async fn set_status(&self, status: AgentStatus) {
        *self.status.write().await = status;
    }

    /// Upgrade request carrying the agent JWT in the configured header.
    pub fn request(&self) -> Result<Request> {
        let mut request = self.settings.ws_url.as_str().into_client_request()?;
        if let Some(token) = &self.settings.token {
            let name = HeaderName::from_bytes(self.settings.auth_header.as_bytes())
                .map_err(|e| ShowcaseError::ConfigError(format!("Invalid auth header name: {}", e)))?;
            let value = HeaderValue::from_str(token)
                .map_err(|e| ShowcaseError::ConfigError(format!("Invalid agent token: {}", e)))?;
            request.headers_mut().insert(name, value);
        }
        Ok(request)
    }

    /// Turns one text frame into the reply to send, if any.
    pub async fn handle_frame(&self, text: &str) -> Option<Envelope> {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Ignoring frame: {}", e);
                return None;
            }
        };

        if !envelope.is_invocation() {
            info!(
                "System message ({}): {}",
                envelope.message_type.as_str(),
                preview(text, 200)
            );
            return None;
        }

        let Envelope {
            invoked_by,
            request_payload,
            ..
        } = envelope;
        let payload = request_payload.unwrap_or_default();
        let name = self.agent.name();
        debug!("{} invoked by {:?}", name, invoked_by);

        {
            let mut metrics = self.metrics.write().await;
            metrics.invocations += 1;
            metrics.last_invocation = Some(Utc::now());
        }

        match self.agent.process(payload).await {
            Ok(result) => {
                if is_error(&result) {
                    self.metrics.write().await.failures += 1;
                }
                Some(Envelope::response(invoked_by, result))
            }
            Err(e) => {
                error!("{} failed to process invocation: {}", name, e);
                self.metrics.write().await.failures += 1;
                invoked_by.map(|id| Envelope::error(Some(id), &name, e))
            }
        }
    }

    async fn connect_once(&self, shutdown: &mut mpsc::Receiver<()>) -> Result<SessionEnd> {
        self.set_status(AgentStatus::Connecting).await;
        let name = self.agent.name();
        info!("{} connecting to {}", name, self.settings.ws_url);

        let (stream, _) = connect_async(self.request()?).await?;
        let (mut write, mut read) = stream.split();

        let register = Envelope::register(&self.agent.descriptor())?;
        write.send(Message::Text(register.to_json()?)).await?;

        self.set_status(AgentStatus::Active).await;
        self.metrics.write().await.connected_at = Some(Utc::now());
        info!("{} registered with router", name);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Received shutdown signal for agent {}", name);
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.handle_frame(&text).await {
                            write.send(Message::Text(reply.to_json()?)).await?;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        info!("Router closed the connection for {}: {:?}", name, reason);
                        return Ok(SessionEnd::Closed);
                    }
                    // ping replies are queued by the transport
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Closed),
                },
            }
        }
    }

    /// Runs until shutdown or until reconnect attempts are used up.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        let name = self.agent.name();
        let mut attempt = 0;

        loop {
            let outcome = self.connect_once(&mut shutdown).await;
            let failure = match outcome {
                Ok(SessionEnd::Shutdown) => {
                    self.set_status(AgentStatus::Stopped).await;
                    return Ok(());
                }
                Ok(SessionEnd::Closed) => {
                    // a session that got registered earns a fresh retry budget
                    attempt = 0;
                    None
                }
                Err(e) => {
                    error!("{} connection failed: {}", name, e);
                    Some(e)
                }
            };

            if attempt >= self.settings.reconnect_attempts {
                return match failure {
                    Some(e) => {
                        self.set_status(AgentStatus::Error(e.to_string())).await;
                        Err(ShowcaseError::NetworkError(format!(
                            "{} gave up after {} reconnect attempts: {}",
                            name, attempt, e
                        ))
                        .into())
                    }
                    None => {
                        self.set_status(AgentStatus::Stopped).await;
                        Ok(())
                    }
                };
            }

            let delay = backoff_delay(attempt);
            attempt += 1;
            self.set_status(AgentStatus::Reconnecting).await;
            self.metrics.write().await.reconnects += 1;
            warn!(
                "{} reconnecting in {:?} (attempt {}/{})",
                name, delay, attempt, self.settings.reconnect_attempts
            );

            tokio::select! {
                _ = shutdown.recv() => {
                    self.set_status(AgentStatus::Stopped).await;
                    return Ok(());
                }
                _ = sleep(delay) => {}
            }
        }
    }
}
