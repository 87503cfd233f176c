use anyhow::anyhow;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use agentos_showcase::agents::report_generator::ReportOptions;
use agentos_showcase::agents::{AgentRegistry, AgentSession, SessionSettings};
use agentos_showcase::api::{start_api_server, ApiState};
use agentos_showcase::backend::{BackendClient, FlowBackend};
use agentos_showcase::config::{Config, ConfigManager, FileConfigManager};
use agentos_showcase::error::{Result, ShowcaseError};
use agentos_showcase::pipeline::{print_summary, LocalPipeline, RemotePipeline};
use agentos_showcase::samples;
use agentos_showcase::storage::{ResultStore, StorageManager};
use agentos_showcase::supervisor::{agent_launcher, Supervisor};

#[derive(Parser)]
#[command(name = "showcase", version, about = "Document analysis agents for the AgentOS platform")]
struct Cli {
    /// Configuration file, created with defaults when missing
    #[arg(short, long, global = true, default_value = "showcase.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run or list agents
    Agent {
        #[command(subcommand)]
        action: AgentCommand,
    },
    /// Run every enabled agent as a child process and serve the status API
    Supervise {
        /// Agents to start instead of the enabled ones
        #[arg(long = "agent")]
        agents: Vec<String>,
    },
    /// Analyze one document
    Pipeline {
        #[command(subcommand)]
        mode: PipelineCommand,
    },
    /// Manage the bundled sample documents
    Samples {
        #[command(subcommand)]
        action: SamplesCommand,
    },
    /// Create the demo user and register every agent with the backend
    Register,
    /// Show backend health and supervisor status
    Status,
    /// Analyze every sample document locally and save the reports
    Demo,
}

#[derive(Subcommand)]
enum AgentCommand {
    /// Connect one agent to the router and serve invocations
    Run { name: String },
    /// List the available agents
    List,
}

#[derive(Subcommand)]
enum PipelineCommand {
    /// Run all stages in this process
    Local {
        #[arg(short, long)]
        document: PathBuf,
    },
    /// Upload the document and run the stages as a backend flow
    Remote {
        #[arg(short, long)]
        document: PathBuf,
        #[arg(short, long, default_value = "detailed")]
        format: String,
    },
}

#[derive(Subcommand)]
enum SamplesCommand {
    /// Write the sample documents to the samples directory
    Generate,
    /// Upload the sample documents to the backend
    Upload,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let manager = FileConfigManager::new(cli.config.clone());
    let config = manager.load_config().await.map_err(|e| anyhow!(e))?;

    let outcome = match cli.command {
        Command::Agent { action: AgentCommand::Run { name } } => run_agent(&config, &name).await,
        Command::Agent { action: AgentCommand::List } => list_agents(&config),
        Command::Supervise { agents } => supervise(&manager, config, agents).await,
        Command::Pipeline { mode: PipelineCommand::Local { document } } => pipeline_local(&config, &document).await,
        Command::Pipeline { mode: PipelineCommand::Remote { document, format } } => {
            pipeline_remote(&config, &document, &format).await
        }
        Command::Samples { action: SamplesCommand::Generate } => generate_samples(&config),
        Command::Samples { action: SamplesCommand::Upload } => upload_samples(&config).await,
        Command::Register => register(&config).await,
        Command::Status => status(&config).await,
        Command::Demo => demo(&config).await,
    };

    outcome.map_err(|e| anyhow!(e))
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn report_options(config: &Config) -> ReportOptions {
    ReportOptions {
        include_html: config.output.include_html,
        include_pdf: config.output.include_pdf,
    }
}

fn result_stem(document: &Path) -> String {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{}_analysis", stem)
}

async fn run_agent(config: &Config, name: &str) -> Result<()> {
    let agent = AgentRegistry::build(name)?;
    let session = AgentSession::new(agent, SessionSettings::from_config(config, name));

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    info!("Starting agent {}", name);
    session.run(shutdown_rx).await?;

    let metrics = session.metrics().await;
    info!(
        "Agent {} stopped after {} invocations ({} failed)",
        name, metrics.invocations, metrics.failures
    );
    Ok(())
}

fn list_agents(config: &Config) -> Result<()> {
    for descriptor in AgentRegistry::descriptors()? {
        let enabled = config
            .agent(&descriptor.agent_name)
            .map(|a| a.enabled)
            .unwrap_or(false);
        println!(
            "{:<20} {:<8} {}",
            descriptor.agent_name,
            if enabled { "enabled" } else { "disabled" },
            descriptor.agent_description
        );
    }
    Ok(())
}

async fn supervise(manager: &FileConfigManager, config: Config, agents: Vec<String>) -> Result<()> {
    let agents = if agents.is_empty() {
        config.enabled_agents().map(|a| a.name.clone()).collect()
    } else {
        for name in &agents {
            AgentRegistry::build(name)?;
        }
        agents
    };

    let supervisor = Arc::new(Supervisor::new(config.supervisor.clone(), agent_launcher(manager.path())?));
    let config_updates = match manager.watch_config_changes().await {
        Ok(rx) => Some(rx),
        Err(e) => {
            warn!("Configuration reload disabled: {}", e);
            None
        }
    };

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let (api_stop_tx, api_stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
        let _ = api_stop_tx.send(());
    });

    let state = ApiState {
        supervisor: supervisor.clone(),
        api_token: config.supervisor.api_token.clone(),
    };
    let port = config.supervisor.status_port;
    let api = tokio::spawn(async move {
        let stopped = async move {
            let _ = api_stop_rx.await;
        };
        if let Err(e) = start_api_server(state, port, stopped).await {
            error!("Status API stopped: {}", e);
        }
    });

    supervisor.run(&agents, shutdown_rx, config_updates).await?;
    api.abort();
    info!("Supervisor stopped");
    Ok(())
}

async fn store(config: &Config, document: &Path, result: &Value) -> Result<()> {
    let store = ResultStore::new(config.output.directory.clone());
    let saved = store.store_result(&result_stem(document), result).await?;
    for path in saved.paths() {
        println!("Saved {}", path.display());
    }
    Ok(())
}

async fn pipeline_local(config: &Config, document: &Path) -> Result<()> {
    let pipeline = LocalPipeline::new(report_options(config))?;
    let result = pipeline.run(document).await;
    let json = result.to_json();
    print_summary(&json);
    store(config, document, &json).await?;

    match result.failed_stage() {
        Some(stage) => Err(ShowcaseError::AgentError(format!(
            "{} failed: {}",
            stage.stage,
            stage.error.as_deref().unwrap_or("unknown error")
        ))
        .into()),
        None => Ok(()),
    }
}

async fn pipeline_remote(config: &Config, document: &Path, format: &str) -> Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let pipeline = RemotePipeline::new(client, &config.backend, &config.flow);
    let result = pipeline.run(document, format).await?;
    print_summary(&result);
    store(config, document, &result).await
}

fn generate_samples(config: &Config) -> Result<()> {
    for path in samples::generate(&config.samples.directory)? {
        println!("{}", path.display());
    }
    Ok(())
}

async fn upload_samples(config: &Config) -> Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let outcomes = samples::upload_all(
        &client,
        &config.backend.username,
        &config.backend.password,
        &config.samples.directory,
    )
    .await?;

    for outcome in &outcomes {
        match (&outcome.file_id, &outcome.error) {
            (Some(id), _) => println!("{:<24} uploaded ({})", outcome.filename, id),
            (None, error) => println!(
                "{:<24} failed: {}",
                outcome.filename,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    Ok(())
}

async fn register(config: &Config) -> Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let (username, password) = (&config.backend.username, &config.backend.password);

    client.create_user(username, password).await?;
    client.login(username, password).await?;

    let mut failures = 0;
    for descriptor in AgentRegistry::descriptors()? {
        match client.register_agent(&descriptor).await {
            Ok(endpoint) => println!("{:<20} registered via {}", descriptor.agent_name, endpoint),
            Err(e) => {
                failures += 1;
                println!("{:<20} failed: {}", descriptor.agent_name, e);
            }
        }
    }

    match client.list_agents().await {
        Ok(agents) => info!("Backend lists {} agents", agents.len()),
        Err(e) => warn!("Could not list agents: {}", e),
    }

    if failures > 0 {
        return Err(ShowcaseError::BackendError {
            status: 0,
            body: format!("{} agents failed to register", failures),
        }
        .into());
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let client = BackendClient::new(&config.backend)?;
    match client.health().await {
        Ok(health) => println!("Backend: {}", health),
        Err(e) => println!("Backend: unreachable ({})", e),
    }

    let url = format!("http://127.0.0.1:{}/status", config.supervisor.status_port);
    let mut request = reqwest::Client::new().get(&url);
    if let Some(token) = &config.supervisor.api_token {
        request = request.bearer_auth(token);
    }
    match request.send().await {
        Ok(response) => {
            let body: Value = response.json().await?;
            if let Some(agents) = body["data"]["agents"].as_array() {
                for agent in agents {
                    println!(
                        "{:<20} running={} pid={} restarts={}",
                        agent["name"].as_str().unwrap_or("?"),
                        agent["running"],
                        agent["pid"],
                        agent["restarts"]
                    );
                }
            } else {
                println!("Supervisor: {}", body);
            }
        }
        Err(e) => println!("Supervisor: not running ({})", e),
    }
    Ok(())
}

async fn demo(config: &Config) -> Result<()> {
    let documents = samples::generate(&config.samples.directory)?;
    let pipeline = LocalPipeline::new(report_options(config))?;

    let mut failed = Vec::new();
    for document in &documents {
        println!("\n=== {} ===", document.display());
        let result = pipeline.run(document).await;
        let json = result.to_json();
        print_summary(&json);
        store(config, document, &json).await?;
        if let Some(stage) = result.failed_stage() {
            failed.push(format!("{} ({})", document.display(), stage.stage));
        }
    }

    println!(
        "\nAnalyzed {}/{} documents, results in {}",
        documents.len() - failed.len(),
        documents.len(),
        config.output.directory.display()
    );
    if !failed.is_empty() {
        return Err(ShowcaseError::AgentError(format!("Failed: {}", failed.join(", "))).into());
    }
    Ok(())
}
