//! btctest CLI entry point
//!
//! Orchestrates the complete workflow: resolve configuration, clone Bitcoin
//! Core (cached, retried), build the Docker test image, run the selected
//! suites in a disposable container, and clean up. The process exit code is
//! the container's own exit code on a completed run, or a per-category error
//! code otherwise (see [`cli`]).

// CLI binary needs to talk to stdout/stderr directly
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod logging;

use crate::cli::{Cli, EXIT_CONFIG, EXIT_GENERIC, EXIT_OK, EXIT_SIGINT};
use btctest_core::monitor::{PerfMonitor, averages, optimal_parallel_jobs};
use btctest_core::{Config, validate};
use btctest_docker::{ComposeCommand, ops};
use btctest_vcs::{CloneRequest, RepoCache, RetryPolicy, ensure_cloned};
use clap::Parser;
use miette::Report;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Directory the repository is cloned into, relative to the working directory
const TARGET_DIR: &str = "bitcoin";

fn main() {
    // NOTE: eprintln! in the panic hook is intentional - tracing may be
    // corrupted during a panic, so use the most reliable output available.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();
    let overrides = cli.overrides();

    let config = match Config::load(&overrides) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{:?}", Report::new(err));
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(err) = logging::init_tracing(&config.logging) {
        eprintln!("{err:?}");
        std::process::exit(EXIT_CONFIG);
    }

    let validated = validate::validate_repo_url(&config.repository.url)
        .and_then(|_| validate::validate_branch_name(&config.repository.branch));
    if let Err(err) = validated {
        eprintln!("{:?}", Report::new(err));
        std::process::exit(EXIT_CONFIG);
    }

    if cli.show_config {
        println!("{}", config.summary());
        std::process::exit(EXIT_OK);
    }
    if let Some(path) = &cli.save_config {
        match config.save_env_file(path) {
            Ok(()) => {
                println!("Configuration saved to {}", path.display());
                std::process::exit(EXIT_OK);
            }
            Err(err) => {
                eprintln!("{:?}", Report::new(err));
                std::process::exit(EXIT_CONFIG);
            }
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to create async runtime: {err}");
            std::process::exit(EXIT_GENERIC);
        }
    };

    let code = runtime.block_on(run(&cli, &config));
    std::process::exit(code);
}

/// Top-level run: banner, dry-run handling, the workflow raced against
/// Ctrl-C, and the closing duration report.
async fn run(cli: &Cli, config: &Config) -> i32 {
    if !config.quiet {
        println!("Bitcoin Core Tests Runner");
        println!("{}", config.summary());
        println!();
    }

    let started = chrono::Local::now();
    if !config.quiet {
        println!("Started at {}", started.format("%Y-%m-%d %H:%M:%S"));
        println!();
    }
    info!("Starting Bitcoin Core tests runner");

    if config.dry_run {
        println!("[DRY RUN] Would execute the following operations:");
        println!(
            "  - Clone repository: {} (branch: {})",
            config.repository.url, config.repository.branch
        );
        println!("  - Build type: {}", config.build.build_type);
        println!("  - Run tests with timeout: {}s", config.test.timeout);
        println!("[DRY RUN] Exiting without executing operations");
        return EXIT_OK;
    }

    let code = tokio::select! {
        code = workflow(cli, config) => code,
        _ = tokio::signal::ctrl_c() => interrupted(config).await,
    };

    let finished = chrono::Local::now();
    if !config.quiet {
        println!("Completed at {}", finished.format("%Y-%m-%d %H:%M:%S"));
        let elapsed = finished.signed_duration_since(started);
        println!(
            "Duration: {}m{}s",
            elapsed.num_minutes(),
            elapsed.num_seconds() % 60
        );
    }
    info!("Total execution time: {}s", finished.signed_duration_since(started).num_seconds());

    code
}

/// Best-effort cleanup after Ctrl-C: drop a partially cloned target and tear
/// down any containers. A cache entry that was already written stays.
async fn interrupted(config: &Config) -> i32 {
    warn!("Operation cancelled by user");
    eprintln!();
    eprintln!("[INTERRUPTED] Operation cancelled by user");

    let target = Path::new(TARGET_DIR);
    if target.exists() && !target.join("CMakeLists.txt").exists() {
        debug!("Removing partially cloned {TARGET_DIR}");
        let _ = std::fs::remove_dir_all(target);
    }
    if let Ok(compose) = ComposeCommand::detect().await {
        ops::cleanup(&compose, config).await;
    }
    EXIT_SIGINT
}

fn clone_request(config: &Config) -> CloneRequest {
    CloneRequest {
        repo_url: config.repository.url.clone(),
        branch: config.repository.branch.clone(),
        target_dir: TARGET_DIR.into(),
        use_cache: config.network.use_git_cache,
        shallow: config.repository.shallow_clone,
        depth: config.repository.clone_depth,
        policy: RetryPolicy {
            max_retries: config.repository.clone_retries,
            timeout: Duration::from_secs(config.repository.clone_timeout),
            retry_delay: Duration::from_secs(config.repository.clone_retry_delay),
        },
    }
}

/// The actual pipeline: cache, prerequisites, clone, image build, test run,
/// cleanup. Returns the process exit code.
async fn workflow(cli: &Cli, config: &Config) -> i32 {
    let mut config = config.clone();
    if config.build.parallel_jobs.is_none() {
        let jobs = optimal_parallel_jobs(None);
        debug!("Auto-detected {jobs} parallel build jobs");
        config.build.parallel_jobs = Some(jobs);
    }
    let config = &config;

    let cache_root = config
        .network
        .cache_dir
        .clone()
        .unwrap_or_else(btctest_vcs::cache::default_root);
    let cache = match RepoCache::open(&cache_root, config.network.max_cache_size_gb) {
        Ok(cache) => cache,
        Err(err) => {
            eprintln!(
                "[ERROR] Cannot open repository cache at {}: {err}",
                cache_root.display()
            );
            return EXIT_GENERIC;
        }
    };
    if cli.clear_cache {
        cache.clear();
        println!("Repository cache cleared");
        return EXIT_OK;
    }

    if !config.quiet {
        println!("Checking prerequisites...");
    }
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("[ERROR] Cannot determine working directory: {err}");
            return EXIT_GENERIC;
        }
    };
    if let Err(err) = ops::verify_prerequisite_files(&cwd, &config.docker.compose_file) {
        eprintln!("{:?}", Report::new(err));
        return EXIT_GENERIC;
    }
    let compose = match ComposeCommand::detect().await {
        Ok(compose) => compose,
        Err(err) => {
            eprintln!("{:?}", Report::new(err));
            return EXIT_GENERIC;
        }
    };

    // Clone with resource monitoring
    let mut monitor = PerfMonitor::new(Duration::from_secs(1));
    monitor.start();
    let clone_result = ensure_cloned(&clone_request(config), &cache).await;
    let samples = monitor.stop();
    if let Some((cpu, mem)) = averages(&samples) {
        if cli.performance_monitor {
            println!("Clone resource usage: avg CPU {cpu:.1}%, avg memory {mem:.1}%");
        }
        debug!("Clone resource usage: avg CPU {cpu:.1}%, avg memory {mem:.1}%");
    }
    if let Err(err) = clone_result {
        let code = cli::exit_code_for_clone(&err);
        eprintln!("{:?}", Report::new(err));
        return code;
    }

    if !Path::new(TARGET_DIR).join("CMakeLists.txt").exists() {
        eprintln!("[ERROR] Bitcoin CMakeLists.txt not found after cloning");
        eprintln!("The repository may not be a valid Bitcoin Core repository.");
        return EXIT_GENERIC;
    }
    if !config.quiet {
        println!("[OK] Prerequisites check passed");
        println!();
    }

    if !config.quiet {
        println!("Building Docker image...");
    }
    if let Err(err) = ops::build_image(&compose, config).await {
        let code = cli::exit_code_for_docker(&err);
        eprintln!("{:?}", Report::new(err));
        return code;
    }
    if !config.quiet {
        println!("[OK] Docker image built successfully");
        println!();
    }

    if !config.quiet {
        println!("Running Bitcoin Core {}...", config.test.test_suite.describe());
    }
    let code = match ops::run_tests(&compose, config).await {
        Ok(code) => code,
        Err(err) => {
            let code = cli::exit_code_for_docker(&err);
            eprintln!("{:?}", Report::new(err));
            if !config.docker.keep_containers {
                ops::cleanup(&compose, config).await;
            }
            return code;
        }
    };

    if !config.quiet {
        println!();
        if code == 0 {
            println!("[SUCCESS] All tests passed!");
        } else {
            println!("[FAILED] Some tests failed (exit code: {code})");
        }
    }

    if config.docker.keep_containers {
        info!("Keeping containers as requested");
    } else {
        if !config.quiet {
            println!("Cleaning up containers...");
        }
        ops::cleanup(&compose, config).await;
    }

    code
}
