// Main entry point for allure-relay

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use allure_relay::cli::{Cli, Commands};
use allure_relay::commands::handle_replay;
use allure_relay::config::{self, Config};
use allure_relay::{logging, worker};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from file (if exists)
    let file_config = Config::load();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    if cli.verbose {
        info!("Starting allure-relay v{}", env!("CARGO_PKG_VERSION"));
    }

    // Handle config flag
    if cli.config {
        let loaded = file_config.is_some();
        let config = file_config.unwrap_or_default();
        println!("Current configuration:");
        println!("  Results directory: {}", config.report.results_dir.display());
        if let Some(ref watch_dir) = config.report.watch_dir {
            println!("  Watch directory: {}", watch_dir.display());
        }
        println!("  Default suite: {}", config.report.default_suite);
        println!("  Concurrency: {}", config.queue.concurrency);
        println!("  Task timeout: {}ms", config.queue.task_timeout_ms);
        println!("  Flush timeout: {}ms", config.queue.flush_timeout_ms);
        println!("  Executor: {:?}", config.executor.mode);
        if !loaded {
            println!("\n  No configuration file loaded");
            println!(
                "  Create one with: allure-relay --init-config {}",
                config::CONFIG_FILE_NAME
            );
        }
        return Ok(());
    }

    // Handle init_config flag
    if let Some(config_file) = cli.init_config {
        std::fs::write(&config_file, Config::default().to_toml())?;
        println!("Configuration file created: {}", config_file.display());
        println!("\nConfiguration precedence:");
        println!("  1. Command-line arguments (highest)");
        println!("  2. Configuration file");
        println!("  3. Built-in defaults (lowest)");
        return Ok(());
    }

    match &cli.command {
        Some(Commands::Worker(args)) => worker::run(args.port).await,
        Some(Commands::Replay(args)) => {
            let config = args.apply_to(file_config.unwrap_or_default());
            let summary = handle_replay(&args.events, &config).await?;
            println!(
                "Replayed {} event(s) into {}",
                summary.events,
                config.report.results_dir.display()
            );
            if summary.skipped > 0 {
                warn!("{} line(s) skipped", summary.skipped);
            }
            if !summary.flushed {
                anyhow::bail!(
                    "Queued writes did not finish within {}ms",
                    config.queue.flush_timeout_ms
                );
            }
            Ok(())
        }
        None => {
            warn!("No command given. Use 'allure-relay --help' for usage.");
            Ok(())
        }
    }
}
