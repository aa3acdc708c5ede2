// Worker process lifecycle and request dispatch

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ops::{Operation, OperationResult};
use crate::worker::{HEALTH_PATH, READY_PREFIX, TASK_PATH};

/// Carries the worker's port to sibling processes. Nothing here sets it:
/// whoever launches the siblings exports it, e.g. from [`RemoteExecutor::port_env`].
pub const ENV_WORKER_PORT: &str = "ALLURE_RELAY_WORKER_PORT";

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker did not report ready within {0:?}")]
    StartupTimeout(Duration),

    #[error("worker exited before it was ready (status: {0})")]
    EarlyExit(String),

    #[error("worker handshake failed: {0}")]
    Handshake(String),

    #[error("request to worker failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Binary started as the worker
    pub program: PathBuf,
    /// Arguments placed before `--port <n>`
    pub args: Vec<String>,
    pub startup_timeout: Duration,
    pub stop_grace: Duration,
    pub request_timeout: Duration,
}

impl RemoteConfig {
    /// Run the current executable's `worker` subcommand
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::for_program(std::env::current_exe()?))
    }

    pub fn for_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec!["worker".to_string()],
            startup_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct WorkerHandle {
    port: u16,
    /// `None` when attached to a worker some other process owns
    child: Option<Child>,
}

/// Sends operations to a sibling worker over loopback HTTP, starting it on first use.
pub struct RemoteExecutor {
    config: RemoteConfig,
    client: reqwest::Client,
    worker: Mutex<Option<WorkerHandle>>,
}

impl RemoteExecutor {
    pub fn new(config: RemoteConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            worker: Mutex::new(None),
        }
    }

    /// Attach to the worker named by `ALLURE_RELAY_WORKER_PORT`, if set
    pub fn from_env(config: RemoteConfig) -> Option<Self> {
        let port = std::env::var(ENV_WORKER_PORT).ok()?.trim().parse().ok()?;
        Some(Self::attached(config, port))
    }

    pub fn attached(config: RemoteConfig, port: u16) -> Self {
        let executor = Self::new(config);
        Self {
            worker: Mutex::new(Some(WorkerHandle { port, child: None })),
            ..executor
        }
    }

    /// Port of the running worker, if started
    pub async fn port(&self) -> Option<u16> {
        self.worker.lock().await.as_ref().map(|w| w.port)
    }

    /// `(name, value)` to hand the worker's port to a child process.
    /// The caller owns that process and must put the pair in its environment.
    pub async fn port_env(&self) -> Option<(&'static str, String)> {
        self.port().await.map(|p| (ENV_WORKER_PORT, p.to_string()))
    }

    /// Start the worker unless one is already running and return its port
    pub async fn start(&self) -> Result<u16, ExecutorError> {
        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.as_ref() {
            return Ok(handle.port);
        }
        let handle = self.spawn_worker().await?;
        let port = handle.port;
        *worker = Some(handle);
        Ok(port)
    }

    async fn spawn_worker(&self) -> Result<WorkerHandle, ExecutorError> {
        let requested = free_loopback_port()?;
        debug!(
            "Starting worker {} on port {}",
            self.config.program.display(),
            requested
        );

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg("--port")
            .arg(requested.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Handshake("worker stdout is not captured".into()))?;
        let mut lines = BufReader::new(stdout).lines();

        let handshake = async {
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if let Some(port) = parse_ready_line(&line) {
                                return Ok(port);
                            }
                            debug!("worker: {}", line);
                        }
                        Ok(None) => {
                            return Err(ExecutorError::EarlyExit("stdout closed".to_string()));
                        }
                        Err(e) => return Err(ExecutorError::Handshake(e.to_string())),
                    },
                    status = child.wait() => {
                        return Err(match status {
                            Ok(status) => ExecutorError::EarlyExit(status.to_string()),
                            Err(e) => ExecutorError::Spawn(e),
                        });
                    }
                }
            }
        };

        let port = match tokio::time::timeout(self.config.startup_timeout, handshake).await {
            Ok(Ok(port)) => port,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                let _ = child.kill().await;
                return Err(ExecutorError::StartupTimeout(self.config.startup_timeout));
            }
        };

        tokio::spawn(drain_stdout(lines));
        info!("Worker ready on 127.0.0.1:{}", port);
        Ok(WorkerHandle {
            port,
            child: Some(child),
        })
    }

    /// Send one operation; start and transport failures come back as `success: false`
    pub async fn execute(&self, operation: Operation) -> OperationResult {
        let port = match self.start().await {
            Ok(port) => port,
            Err(e) => {
                warn!("Worker unavailable for {}: {}", operation.kind(), e);
                return OperationResult::err(e.to_string());
            }
        };

        match self.post(port, &operation).await {
            Ok(result) => result,
            Err(e) => {
                warn!("{} not delivered to worker: {}", operation.kind(), e);
                OperationResult::err(e.to_string())
            }
        }
    }

    async fn post(&self, port: u16, operation: &Operation) -> Result<OperationResult, ExecutorError> {
        let response = self
            .client
            .post(format!("http://127.0.0.1:{}{}", port, TASK_PATH))
            .json(operation)
            .send()
            .await?;
        Ok(response.json::<OperationResult>().await?)
    }

    /// Liveness and queue depth of the running worker
    pub async fn health(&self) -> Result<Value, ExecutorError> {
        let port = self.start().await?;
        let response = self
            .client
            .get(format!("http://127.0.0.1:{}{}", port, HEALTH_PATH))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    /// Ask the worker to shut down, then kill it if it is still alive after the grace period
    pub async fn stop(&self) {
        let Some(mut handle) = self.worker.lock().await.take() else {
            return;
        };
        let Some(mut child) = handle.child.take() else {
            debug!("Detaching from worker on port {}", handle.port);
            return;
        };

        if let Err(e) = self.post(handle.port, &Operation::Shutdown).await {
            debug!("Shutdown request failed: {}", e);
        }

        match tokio::time::timeout(self.config.stop_grace, child.wait()).await {
            Ok(Ok(status)) => debug!("Worker exited: {}", status),
            Ok(Err(e)) => warn!("Failed to wait for worker: {}", e),
            Err(_) => {
                warn!(
                    "Worker still alive after {:?}; killing it",
                    self.config.stop_grace
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill worker: {}", e);
                }
            }
        }
    }
}

/// Port number announced by a `READY_PREFIX<port>` line
pub fn parse_ready_line(line: &str) -> Option<u16> {
    line.trim().strip_prefix(READY_PREFIX)?.trim().parse().ok()
}

fn free_loopback_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

async fn drain_stdout(mut lines: tokio::io::Lines<BufReader<ChildStdout>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("worker: {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ready_line() {
        assert_eq!(parse_ready_line(&format!("{}4123", READY_PREFIX)), Some(4123));
        assert_eq!(parse_ready_line(&format!("  {}80\n", READY_PREFIX)), Some(80));
        assert_eq!(parse_ready_line("listening on 4123"), None);
        assert_eq!(parse_ready_line(&format!("{}abc", READY_PREFIX)), None);
    }

    #[test]
    fn test_free_loopback_port() {
        assert!(free_loopback_port().expect("bind") > 0);
    }

    #[tokio::test]
    async fn test_missing_program_reports_failure() {
        let config = RemoteConfig::for_program("/nonexistent/allure-relay-worker");
        let executor = RemoteExecutor::new(config);

        let result = executor.execute(Operation::Health).await;
        assert!(!result.success);
        assert!(executor.port().await.is_none());
    }
}
