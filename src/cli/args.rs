// CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, ExecutorMode};

/// Relay test lifecycle events into Allure result files
#[derive(Parser, Debug)]
#[command(name = "allure-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn test lifecycle events into Allure results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose debug output
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Show current configuration and exit
    #[arg(long, default_value_t = false)]
    pub config: bool,

    /// Create default configuration file
    #[arg(long, value_name = "CONFIG_FILE")]
    pub init_config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed a newline-delimited JSON event stream through the reporter
    Replay(ReplayArgs),

    /// Run the operation worker (started by the remote executor)
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// File with one lifecycle event per line
    pub events: PathBuf,

    /// Directory for result files
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Directory finished specs are moved to
    #[arg(long, value_name = "DIR")]
    pub watch_dir: Option<PathBuf>,

    /// Execute file operations in a separate worker process
    #[arg(long, default_value_t = false)]
    pub remote: bool,

    /// Tasks running at once across all specs
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-task timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub task_timeout_ms: Option<u64>,

    /// How long to wait for queued writes at the end, in milliseconds
    #[arg(long, value_name = "MS")]
    pub flush_timeout_ms: Option<u64>,
}

impl ReplayArgs {
    /// Command-line values override the configuration file
    pub fn apply_to(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.results_dir {
            config.report.results_dir = dir.clone();
        }
        if self.watch_dir.is_some() {
            config.report.watch_dir = self.watch_dir.clone();
        }
        if self.remote {
            config.executor.mode = ExecutorMode::Remote;
        }
        if let Some(concurrency) = self.concurrency {
            config.queue.concurrency = concurrency.max(1);
        }
        if let Some(ms) = self.task_timeout_ms {
            config.queue.task_timeout_ms = ms;
        }
        if let Some(ms) = self.flush_timeout_ms {
            config.queue.flush_timeout_ms = ms;
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Port to listen on; 0 picks a free one
    #[arg(long, default_value_t = 0)]
    pub port: u16,
}
