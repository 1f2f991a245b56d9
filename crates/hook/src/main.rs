// crates/hook/src/main.rs
//! `commit-story-hook` binary: the background worker the post-commit
//! hook spawns, plus the installer that writes the hook.
//!
//! The `run` subcommand always exits 0 — git must never see the worker
//! fail. Its real status goes to telemetry only.

use clap::{Parser, Subcommand};
use commit_story_hook::{install_post_commit, run_worker, WorkerArgs, DEFAULT_WORKER_TIMEOUT_SECS};
use commit_story_observability::{
    init_logging_bridge, init_telemetry, shutdown_telemetry, TelemetryConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "commit-story-hook",
    about = "Post-commit journal worker for commit-story",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background worker for one commit (spawned by the hook).
    Run {
        /// Commit to generate a journal entry for.
        #[arg(long)]
        commit_hash: String,
        /// Repository root.
        #[arg(long)]
        repo_path: PathBuf,
        /// Wall-clock budget in seconds.
        #[arg(long, default_value_t = DEFAULT_WORKER_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Install the post-commit hook into a repository.
    Install {
        /// Repository root (defaults to the current directory).
        #[arg(long, default_value = ".")]
        repo_path: PathBuf,
        /// Run the worker in the foreground instead of detaching.
        #[arg(long)]
        foreground: bool,
        /// Timeout written into the hook script.
        #[arg(long, default_value_t = DEFAULT_WORKER_TIMEOUT_SECS)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Telemetry first: resolved from defaults plus environment, then
    // the logging bridge. Telemetry failures never block the worker.
    let mut telemetry_config = TelemetryConfig::default();
    telemetry_config.resolve_env();
    let telemetry_result = init_telemetry(&telemetry_config);
    init_logging_bridge();
    match telemetry_result {
        Ok(result) => {
            for (name, failure) in &result.failed {
                tracing::warn!("exporter {name} unavailable: {}", failure.details);
            }
        }
        Err(e) => tracing::warn!("telemetry disabled: {e}"),
    }

    let exit_code = match cli.command {
        Commands::Run {
            commit_hash,
            repo_path,
            timeout,
        } => {
            let args = WorkerArgs::new(commit_hash, repo_path).with_timeout(timeout);
            let status = run_worker(args).await;
            tracing::info!(status, "worker finished");
            // Exit status is for telemetry only; git always sees 0.
            0
        }
        Commands::Install {
            repo_path,
            foreground,
            timeout,
        } => match install_post_commit(&repo_path, !foreground, timeout) {
            Ok(path) => {
                println!("post-commit hook installed at {}", path.display());
                0
            }
            Err(e) => {
                eprintln!("hook installation failed: {e}");
                1
            }
        },
    };

    shutdown_telemetry();
    std::process::exit(exit_code);
}
