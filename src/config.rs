// Configuration file handling

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = ".allurerelayrc.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory result files are written to
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Directory finished specs are moved to
    #[serde(default)]
    pub watch_dir: Option<PathBuf>,

    /// Group name for tests outside any suite
    #[serde(default = "default_suite")]
    pub default_suite: String,

    #[serde(default = "default_framework")]
    pub framework: String,

    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            watch_dir: None,
            default_suite: default_suite(),
            framework: default_framework(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Tasks running at once across all specs
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// How long the end of a run waits for queued writes
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            task_timeout_ms: default_task_timeout_ms(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

impl QueueConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub mode: ExecutorMode,

    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Time the worker gets to exit after `shutdown` before it is killed
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::default(),
            startup_timeout_ms: default_startup_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

// Default values
pub fn default_results_dir() -> PathBuf {
    PathBuf::from("allure-results")
}

pub fn default_suite() -> String {
    String::from("Root suite")
}

fn default_framework() -> String {
    String::from("cypress")
}

fn default_language() -> String {
    String::from("javascript")
}

fn default_concurrency() -> usize {
    5
}

fn default_task_timeout_ms() -> u64 {
    30_000
}

fn default_flush_timeout_ms() -> u64 {
    120_000
}

fn default_startup_timeout_ms() -> u64 {
    10_000
}

fn default_stop_grace_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Option<Self> {
        // Check locations in order:
        // 1. .allurerelayrc.toml (current directory)
        // 2. ~/.allurerelayrc.toml (home directory)

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(CONFIG_FILE_NAME));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAME));
        }

        paths
            .iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(path))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Option<Self> {
        toml::from_str(content).ok()
    }

    /// Generate configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[report]
results_dir = "out/allure"
watch_dir = "out/watch"
framework = "playwright"

[queue]
concurrency = 2
task_timeout_ms = 500

[executor]
mode = "remote"
"#;

        let config = Config::parse(toml).expect("Failed to parse config");
        assert_eq!(config.report.results_dir, PathBuf::from("out/allure"));
        assert_eq!(config.report.watch_dir, Some(PathBuf::from("out/watch")));
        assert_eq!(config.report.framework, "playwright");
        assert_eq!(config.report.language, "javascript");
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.queue.task_timeout(), Duration::from_millis(500));
        assert_eq!(config.queue.flush_timeout_ms, 120_000);
        assert_eq!(config.executor.mode, ExecutorMode::Remote);
        assert_eq!(config.executor.stop_grace_ms, 2_000);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Config::parse("[executor]\nmode = \"cluster\"\n").is_none());
    }
}
