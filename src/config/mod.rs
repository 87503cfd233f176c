use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::agents::registry::AGENT_NAMES;
use crate::error::{Result, ShowcaseError};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub backend: BackendConfig,
    pub router: RouterConfig,
    pub flow: FlowConfig,
    pub supervisor: SupervisorConfig,
    pub output: OutputConfig,
    pub samples: SamplesConfig,
    pub agents: Vec<AgentEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouterConfig {
    pub ws_url: String,
    pub auth_header: String,
    pub reconnect_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FlowConfig {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_polls: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SupervisorConfig {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    pub max_restarts: u32,
    pub status_port: u16,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub include_html: bool,
    pub include_pdf: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SamplesConfig {
    pub directory: PathBuf,
}

/// One agent process the supervisor keeps alive.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AgentEntry {
    pub name: String,
    /// JWT sent in the router auth header
    pub token: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                url: "http://localhost:8000".to_string(),
                username: "admin@example.com".to_string(),
                password: "changeme".to_string(),
                request_timeout: Duration::from_secs(30),
            },
            router: RouterConfig {
                ws_url: "ws://localhost:8080/ws".to_string(),
                auth_header: "x-custom-authorization".to_string(),
                reconnect_attempts: 5,
            },
            flow: FlowConfig {
                poll_interval: Duration::from_secs(10),
                max_polls: 30,
            },
            supervisor: SupervisorConfig {
                poll_interval: Duration::from_secs(5),
                stop_timeout: Duration::from_secs(5),
                max_restarts: 3,
                status_port: 8090,
                api_token: None,
            },
            output: OutputConfig {
                directory: PathBuf::from("./showcase_output"),
                include_html: true,
                include_pdf: true,
            },
            samples: SamplesConfig {
                directory: PathBuf::from("./sample_documents"),
            },
            agents: AGENT_NAMES
                .iter()
                .map(|name| AgentEntry {
                    name: name.to_string(),
                    token: None,
                    enabled: true,
                })
                .collect(),
        }
    }
}

impl Config {
    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentEntry> {
        self.agents.iter().filter(|a| a.enabled)
    }

    pub fn agent(&self, name: &str) -> Option<&AgentEntry> {
        self.agents.iter().find(|a| a.name == name)
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    async fn watch_config_changes(&self) -> Result<tokio::sync::mpsc::Receiver<Config>>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        if !self.config_path.exists() {
            warn!("Configuration file not found, creating default config at {:?}", self.config_path);
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ShowcaseError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| ShowcaseError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| ShowcaseError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ShowcaseError::ConfigError(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }

    async fn watch_config_changes(&self) -> Result<tokio::sync::mpsc::Receiver<Config>> {
        let (tx, rx) = mpsc::channel(10);
        let config_path = self.config_path.clone();
        let config_manager = FileConfigManager::new(config_path.clone());

        tokio::spawn(async move {
            if let Err(e) = Self::watch_config_file(config_path, tx, config_manager).await {
                error!("Configuration file watcher error: {}", e);
            }
        });

        Ok(rx)
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        // backend
        let url = &config.backend.url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ShowcaseError::ConfigError(format!("backend.url '{}' must start with http:// or https://", url)).into());
        }
        if config.backend.request_timeout.is_zero() {
            return Err(ShowcaseError::ConfigError("backend.request_timeout must be greater than 0".to_string()).into());
        }

        // router
        let ws = &config.router.ws_url;
        if !ws.starts_with("ws://") && !ws.starts_with("wss://") {
            return Err(ShowcaseError::ConfigError(format!("router.ws_url '{}' must start with ws:// or wss://", ws)).into());
        }
        if config.router.auth_header.trim().is_empty() {
            return Err(ShowcaseError::ConfigError("router.auth_header cannot be empty".to_string()).into());
        }
        if config.router.reconnect_attempts > 20 {
            return Err(ShowcaseError::ConfigError("router.reconnect_attempts cannot exceed 20".to_string()).into());
        }

        // flow polling
        if config.flow.poll_interval.is_zero() {
            return Err(ShowcaseError::ConfigError("flow.poll_interval must be greater than 0".to_string()).into());
        }
        if config.flow.max_polls == 0 {
            return Err(ShowcaseError::ConfigError("flow.max_polls must be greater than 0".to_string()).into());
        }

        // supervisor
        if config.supervisor.poll_interval.is_zero() {
            return Err(ShowcaseError::ConfigError("supervisor.poll_interval must be greater than 0".to_string()).into());
        }
        if config.supervisor.status_port < 1024 {
            return Err(ShowcaseError::ConfigError("supervisor.status_port must be between 1024 and 65535".to_string()).into());
        }
        if config.supervisor.max_restarts > 100 {
            return Err(ShowcaseError::ConfigError("supervisor.max_restarts cannot exceed 100".to_string()).into());
        }

        // agents
        if config.agents.is_empty() {
            return Err(ShowcaseError::ConfigError("agents list cannot be empty".to_string()).into());
        }
        let mut seen = std::collections::HashSet::new();
        for agent in &config.agents {
            if agent.name.trim().is_empty() {
                return Err(ShowcaseError::ConfigError("agent name cannot be empty".to_string()).into());
            }
            if !AGENT_NAMES.contains(&agent.name.as_str()) {
                return Err(ShowcaseError::ConfigError(format!("Unknown agent '{}', must be one of: {:?}", agent.name, AGENT_NAMES)).into());
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(ShowcaseError::ConfigError(format!("Agent '{}' is listed twice", agent.name)).into());
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl FileConfigManager {
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config)
            .map_err(|e| ShowcaseError::ConfigError(format!("Failed to serialize default config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| ShowcaseError::ConfigError(format!("Failed to create config directory: {}", e)))?;
            }
        }

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ShowcaseError::ConfigError(format!("Failed to write default config: {}", e)))?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }

    /// Watch the configuration file and push every valid reload through the channel
    async fn watch_config_file(
        config_path: PathBuf,
        tx: mpsc::Sender<Config>,
        config_manager: FileConfigManager,
    ) -> Result<()> {
        let (file_tx, mut file_rx) = mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if let Err(e) = file_tx.blocking_send(event) {
                        error!("Failed to send file system event: {}", e);
                    }
                }
                Err(e) => error!("File system watcher error: {}", e),
            }
        }).map_err(|e| ShowcaseError::ConfigError(format!("Failed to create file watcher: {}", e)))?;

        let watch_path = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| ShowcaseError::ConfigError(format!("Failed to watch config directory: {}", e)))?;

        info!("Started watching configuration file: {:?}", config_path);

        let file_name = config_path.file_name().map(|n| n.to_os_string());
        while let Some(event) = file_rx.recv().await {
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                continue;
            }
            let ours = event.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if !ours {
                continue;
            }

            debug!("Configuration file changed, reloading...");
            // let the writer finish
            tokio::time::sleep(Duration::from_millis(100)).await;

            match config_manager.load_config().await {
                Ok(new_config) => {
                    info!("Configuration reloaded successfully");
                    if let Err(e) = tx.send(new_config).await {
                        error!("Failed to send updated config: {}", e);
                        break;
                    }
                }
                Err(e) => error!("Failed to reload configuration: {}", e),
            }
        }

        Ok(())
    }
}
