//! Keeps one child process per configured agent alive and reports on them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use sysinfo::{CpuExt, Pid, PidExt, ProcessExt, System, SystemExt};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{Config, SupervisorConfig};
use crate::error::{Result, ShowcaseError};

/// Builds the command that runs one agent.
pub type Launcher = Arc<dyn Fn(&str) -> Command + Send + Sync>;

/// Launches `<this binary> --config <path> agent run <name>`.
pub fn agent_launcher(config_path: &Path) -> Result<Launcher> {
    let program = std::env::current_exe()
        .map_err(|e| ShowcaseError::ConfigError(format!("Cannot locate showcase binary: {}", e)))?;
    let config_path: PathBuf = config_path.to_path_buf();
    Ok(Arc::new(move |name: &str| {
        let mut command = Command::new(&program);
        command.arg("--config").arg(&config_path).args(["agent", "run", name]);
        command
    }))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEvent {
    Started { agent: String, pid: u32 },
    Exited { agent: String, code: Option<i32> },
    Restarted { agent: String, restarts: u32 },
    GaveUp { agent: String, restarts: u32 },
    Stopped { agent: String },
    ConfigReloaded { added: Vec<String>, removed: Vec<String> },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessStatus {
    pub name: String,
    pub pid: Option<u32>,
    pub running: bool,
    pub restarts: u32,
    pub last_exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub memory_bytes: u64,
    pub cpu_usage: f32,
    pub gave_up: bool,
}

impl ProcessStatus {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pid: None,
            running: false,
            restarts: 0,
            last_exit_code: None,
            started_at: None,
            memory_bytes: 0,
            cpu_usage: 0.0,
            gave_up: false,
        }
    }
}

/// Host resource usage, refreshed on every poll.
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub cpu_usage: f32,
    pub memory_usage: u64,
    pub memory_total: u64,
    pub running_agents: usize,
    #[serde(with = "humantime_serde")]
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub agents: Vec<ProcessStatus>,
    pub system_metrics: SystemMetrics,
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
}

struct Managed {
    child: Option<Child>,
    status: ProcessStatus,
}

pub struct Supervisor {
    settings: Arc<RwLock<SupervisorConfig>>,
    launcher: Launcher,
    processes: Arc<RwLock<BTreeMap<String, Managed>>>,
    events: broadcast::Sender<SupervisorEvent>,
    system: Arc<RwLock<System>>,
    system_metrics: Arc<RwLock<SystemMetrics>>,
    start_time: Instant,
}

/// Asks the child to exit, then kills it once `grace` runs out.
async fn terminate(name: &str, child: &mut Child, grace: Duration) -> Option<i32> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // the child is not reaped yet, so the pid still names it
        let sent = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if sent != 0 {
            warn!(
                "Failed to send SIGTERM to {} (pid {}): {}",
                name,
                pid,
                std::io::Error::last_os_error()
            );
        }
    }

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => status.code(),
        Ok(Err(e)) => {
            warn!("Waiting for {} failed: {}", name, e);
            None
        }
        Err(_) => {
            warn!("{} did not exit within {:?}, killing it", name, grace);
            if let Err(e) = child.kill().await {
                error!("Failed to kill {}: {}", name, e);
            }
            None
        }
    }
}

async fn next_config(updates: &mut Option<mpsc::Receiver<Config>>) -> Option<Config> {
    match updates {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

impl Supervisor {
    pub fn new(settings: SupervisorConfig, launcher: Launcher) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            launcher,
            processes: Arc::new(RwLock::new(BTreeMap::new())),
            events,
            system: Arc::new(RwLock::new(System::new())),
            system_metrics: Arc::new(RwLock::new(SystemMetrics {
                cpu_usage: 0.0,
                memory_usage: 0,
                memory_total: 0,
                running_agents: 0,
                timestamp: SystemTime::now(),
            })),
            start_time: Instant::now(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SupervisorEvent) {
        debug!("Supervisor event: {:?}", event);
        let _ = self.events.send(event);
    }

    fn spawn(&self, name: &str) -> Result<Child> {
        let mut command = (self.launcher)(name);
        command.kill_on_drop(true);
        command
            .spawn()
            .map_err(|e| ShowcaseError::AgentError(format!("Failed to start {}: {}", name, e)).into())
    }

    /// Starts `name` unless it is already running; returns its pid.
    pub async fn start_agent(&self, name: &str) -> Result<u32> {
        let mut processes = self.processes.write().await;
        let managed = processes.entry(name.to_string()).or_insert_with(|| Managed {
            child: None,
            status: ProcessStatus::new(name),
        });

        if let (true, Some(pid)) = (managed.status.running, managed.status.pid) {
            return Ok(pid);
        }

        let child = self.spawn(name)?;
        let pid = child.id().unwrap_or_default();
        managed.child = Some(child);
        managed.status.pid = Some(pid);
        managed.status.running = true;
        managed.status.gave_up = false;
        managed.status.started_at = Some(Utc::now());
        drop(processes);

        info!("Started agent {} (pid {})", name, pid);
        self.emit(SupervisorEvent::Started {
            agent: name.to_string(),
            pid,
        });
        Ok(pid)
    }

    /// Stops `name` and forgets it.
    pub async fn stop_agent(&self, name: &str) -> Result<()> {
        let managed = self.processes.write().await.remove(name);
        let Some(mut managed) = managed else {
            return Err(ShowcaseError::AgentError(format!("Agent {} is not supervised", name)).into());
        };

        if let Some(mut child) = managed.child.take() {
            let grace = self.settings.read().await.stop_timeout;
            let code = terminate(name, &mut child, grace).await;
            debug!("{} exited with {:?}", name, code);
        }
        info!("Stopped agent {}", name);
        self.emit(SupervisorEvent::Stopped {
            agent: name.to_string(),
        });
        Ok(())
    }

    /// Stops and starts `name`, counting it as a restart. The process map is
    /// not locked while the old child shuts down.
    pub async fn restart_agent(&self, name: &str) -> Result<u32> {
        let old_child = {
            let mut processes = self.processes.write().await;
            let Some(managed) = processes.get_mut(name) else {
                return Err(ShowcaseError::AgentError(format!("Agent {} is not supervised", name)).into());
            };
            managed.status.running = false;
            managed.child.take()
        };

        let exit_code = match old_child {
            Some(mut child) => {
                let grace = self.settings.read().await.stop_timeout;
                Some(terminate(name, &mut child, grace).await)
            }
            None => None,
        };

        let child = self.spawn(name)?;
        let pid = child.id().unwrap_or_default();

        let mut processes = self.processes.write().await;
        let Some(managed) = processes.get_mut(name) else {
            return Err(ShowcaseError::AgentError(format!("Agent {} was stopped during restart", name)).into());
        };
        if let Some(code) = exit_code {
            managed.status.last_exit_code = code;
        }
        managed.child = Some(child);
        managed.status.pid = Some(pid);
        managed.status.running = true;
        managed.status.gave_up = false;
        managed.status.restarts += 1;
        managed.status.started_at = Some(Utc::now());
        let restarts = managed.status.restarts;
        drop(processes);

        info!("Restarted agent {} (pid {})", name, pid);
        self.emit(SupervisorEvent::Restarted {
            agent: name.to_string(),
            restarts,
        });
        Ok(pid)
    }

    /// One supervision pass: reap dead children, restart them within the
    /// restart budget and refresh resource usage.
    pub async fn poll_once(&self) {
        let max_restarts = self.settings.read().await.max_restarts;
        let mut events = Vec::new();
        let mut processes = self.processes.write().await;

        for (name, managed) in processes.iter_mut() {
            let Some(child) = managed.child.as_mut() else {
                continue;
            };
            let exit = match child.try_wait() {
                Ok(Some(status)) => status.code(),
                Ok(None) => continue,
                Err(e) => {
                    warn!("Cannot check {}: {}", name, e);
                    continue;
                }
            };

            warn!("Agent {} exited with code {:?}", name, exit);
            managed.child = None;
            managed.status.running = false;
            managed.status.last_exit_code = exit;
            events.push(SupervisorEvent::Exited {
                agent: name.clone(),
                code: exit,
            });

            if managed.status.restarts >= max_restarts {
                error!("Agent {} exceeded {} restarts, giving up", name, max_restarts);
                managed.status.gave_up = true;
                events.push(SupervisorEvent::GaveUp {
                    agent: name.clone(),
                    restarts: managed.status.restarts,
                });
                continue;
            }

            match self.spawn(name) {
                Ok(child) => {
                    managed.status.restarts += 1;
                    managed.status.pid = child.id();
                    managed.status.running = true;
                    managed.status.started_at = Some(Utc::now());
                    managed.child = Some(child);
                    info!("Restarted agent {} ({}/{})", name, managed.status.restarts, max_restarts);
                    events.push(SupervisorEvent::Restarted {
                        agent: name.clone(),
                        restarts: managed.status.restarts,
                    });
                }
                Err(e) => {
                    error!("Restart of {} failed: {}", name, e);
                    managed.status.restarts += 1;
                }
            }
        }

        self.refresh_usage(&mut processes).await;
        drop(processes);

        for event in events {
            self.emit(event);
        }
    }

    async fn refresh_usage(&self, processes: &mut BTreeMap<String, Managed>) {
        let mut sys = self.system.write().await;
        sys.refresh_cpu();
        sys.refresh_memory();

        let mut running = 0;
        for managed in processes.values_mut() {
            let Some(pid) = managed.status.pid.filter(|_| managed.status.running) else {
                managed.status.memory_bytes = 0;
                managed.status.cpu_usage = 0.0;
                continue;
            };
            running += 1;
            let pid = Pid::from_u32(pid);
            if sys.refresh_process(pid) {
                if let Some(process) = sys.process(pid) {
                    managed.status.memory_bytes = process.memory();
                    managed.status.cpu_usage = process.cpu_usage();
                }
            }
        }

        let cpus = sys.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };
        *self.system_metrics.write().await = SystemMetrics {
            cpu_usage,
            memory_usage: sys.used_memory(),
            memory_total: sys.total_memory(),
            running_agents: running,
            timestamp: SystemTime::now(),
        };
    }

    pub async fn statuses(&self) -> Vec<ProcessStatus> {
        self.processes
            .read()
            .await
            .values()
            .map(|m| m.status.clone())
            .collect()
    }

    pub async fn agent_status(&self, name: &str) -> Option<ProcessStatus> {
        self.processes.read().await.get(name).map(|m| m.status.clone())
    }

    pub async fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            agents: self.statuses().await,
            system_metrics: self.system_metrics.read().await.clone(),
            uptime: self.start_time.elapsed(),
        }
    }

    /// Reconciles the supervised set with the enabled agents in `config`.
    pub async fn apply_config(&self, config: &Config) -> (Vec<String>, Vec<String>) {
        *self.settings.write().await = config.supervisor.clone();

        let wanted: BTreeSet<String> = config.enabled_agents().map(|a| a.name.clone()).collect();
        let current: BTreeSet<String> = self.processes.read().await.keys().cloned().collect();

        let added: Vec<String> = wanted.difference(&current).cloned().collect();
        let removed: Vec<String> = current.difference(&wanted).cloned().collect();

        for name in &removed {
            if let Err(e) = self.stop_agent(name).await {
                warn!("Failed to stop {}: {}", name, e);
            }
        }
        for name in &added {
            if let Err(e) = self.start_agent(name).await {
                error!("Failed to start {}: {}", name, e);
            }
        }

        if !added.is_empty() || !removed.is_empty() {
            info!("Configuration applied: +{:?} -{:?}", added, removed);
        }
        self.emit(SupervisorEvent::ConfigReloaded {
            added: added.clone(),
            removed: removed.clone(),
        });
        (added, removed)
    }

    pub async fn stop_all(&self) {
        let names: Vec<String> = self.processes.read().await.keys().cloned().collect();
        for name in names {
            if let Err(e) = self.stop_agent(&name).await {
                warn!("Failed to stop {}: {}", name, e);
            }
        }
    }

    /// Starts `agents` and supervises them until `shutdown` fires, applying
    /// config reloads as they arrive.
    pub async fn run(
        &self,
        agents: &[String],
        mut shutdown: mpsc::Receiver<()>,
        mut config_updates: Option<mpsc::Receiver<Config>>,
    ) -> Result<()> {
        for name in agents {
            if let Err(e) = self.start_agent(name).await {
                error!("Failed to start {}: {}", name, e);
            }
        }

        let poll_every = self.settings.read().await.poll_interval;
        let mut ticker = interval(poll_every);
        let mut watching = config_updates.is_some();
        info!("Supervising {} agents, polling every {:?}", agents.len(), poll_every);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Supervisor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => self.poll_once().await,
                update = next_config(&mut config_updates), if watching => match update {
                    Some(config) => {
                        self.apply_config(&config).await;
                    }
                    None => watching = false,
                },
            }
        }

        self.stop_all().await;
        Ok(())
    }
}
