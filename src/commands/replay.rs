// Replay command - feed a recorded event stream through the reporter

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, ExecutorConfig, ExecutorMode};
use crate::executor::{Executor, RemoteConfig, RemoteExecutor};
use crate::queue::TaskQueue;
use crate::report::{Label, QueuedWriter};
use crate::reporter::{LifecycleEvent, Reporter, ReporterOptions};
use crate::time::now_unix_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    /// Events handed to the reporter
    pub events: usize,
    /// Lines that did not parse as an event
    pub skipped: usize,
    /// False when the flush timeout elapsed with writes still queued
    pub flushed: bool,
}

pub async fn handle_replay(events: &Path, config: &Config) -> Result<ReplaySummary> {
    let content = tokio::fs::read_to_string(events)
        .await
        .with_context(|| format!("Failed to read events from {}", events.display()))?;

    let executor = Arc::new(build_executor(&config.executor)?);
    info!("Using {} executor", executor.name());

    let queue = TaskQueue::new(config.queue.concurrency, config.queue.task_timeout());
    let writer = QueuedWriter::new(
        config.report.results_dir.clone(),
        executor.clone(),
        queue.clone(),
    )
    .with_watch_dir(config.report.watch_dir.clone());
    let mut reporter = Reporter::new(writer, reporter_options(config));

    let mut summary = ReplaySummary::default();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LifecycleEvent>(line) {
            Ok(event) => {
                reporter.handle(event);
                summary.events += 1;
            }
            Err(e) => {
                warn!("Skipping line {}: {}", index + 1, e);
                summary.skipped += 1;
            }
        }
    }
    reporter.run_ended(now_unix_millis());

    summary.flushed = queue.flush_all_tasks(config.queue.flush_timeout()).await;
    executor.stop().await;

    Ok(summary)
}

pub fn reporter_options(config: &Config) -> ReporterOptions {
    ReporterOptions {
        default_suite: config.report.default_suite.clone(),
        default_labels: vec![
            Label::new("framework", config.report.framework.clone()),
            Label::new("language", config.report.language.clone()),
        ],
    }
    .with_environment_labels()
}

fn build_executor(config: &ExecutorConfig) -> Result<Executor> {
    if config.mode == ExecutorMode::Local {
        return Ok(Executor::local());
    }

    let mut remote = RemoteConfig::current_exe().context("Failed to locate the worker binary")?;
    remote.startup_timeout = Duration::from_millis(config.startup_timeout_ms);
    remote.stop_grace = Duration::from_millis(config.stop_grace_ms);
    remote.request_timeout = Duration::from_millis(config.request_timeout_ms);

    let executor = match RemoteExecutor::from_env(remote.clone()) {
        Some(attached) => attached,
        None => RemoteExecutor::new(remote),
    };
    Ok(Executor::Remote(executor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_options_follow_config() {
        let mut config = Config::default();
        config.report.framework = "playwright".to_string();
        config.report.default_suite = "Top".to_string();

        let options = reporter_options(&config);
        assert_eq!(options.default_suite, "Top");
        assert!(
            options
                .default_labels
                .iter()
                .any(|l| l.name == "framework" && l.value == "playwright")
        );
        assert!(options.default_labels.iter().any(|l| l.name == "host"));
    }

    #[tokio::test]
    async fn test_missing_events_file() {
        let err = handle_replay(Path::new("/nonexistent/events.jsonl"), &Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read events"));
    }
}
