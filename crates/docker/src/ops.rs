//! Image build, test execution and cleanup
//!
//! These run compose with inherited stdio so build and test output streams to
//! the user in real time. Only the exit status is interpreted.

use crate::compose::ComposeCommand;
use crate::{Error, Result};
use btctest_core::Config;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Check that the compose file and Dockerfile exist in `dir`.
pub fn verify_prerequisite_files(dir: &Path, compose_file: &str) -> Result<()> {
    for name in [compose_file, "Dockerfile"] {
        let path = dir.join(name);
        if !path.exists() {
            return Err(Error::MissingFile { path });
        }
    }
    Ok(())
}

/// Compose argv for building the test image
#[must_use]
pub fn build_argv(compose: &ComposeCommand, config: &Config) -> Vec<String> {
    let mut argv = compose.argv_for_file(&config.docker.compose_file);
    argv.push("build".to_string());
    if let Some(jobs) = config.build.parallel_jobs.filter(|&jobs| jobs > 1) {
        argv.push("--build-arg".to_string());
        argv.push(format!("CMAKE_BUILD_PARALLEL_LEVEL={jobs}"));
    }
    argv.push("--build-arg".to_string());
    argv.push(format!("BUILD_TYPE={}", config.build.build_type));
    argv.push(config.docker.container_name.clone());
    argv
}

/// Compose argv for running the selected test suites
#[must_use]
pub fn run_argv(compose: &ComposeCommand, config: &Config) -> Vec<String> {
    let mut argv = compose.argv_for_file(&config.docker.compose_file);
    argv.push("run".to_string());
    argv.push("--rm".to_string());

    let mut env = |key: &str, value: String| {
        argv.push("-e".to_string());
        argv.push(format!("{key}={value}"));
    };
    env("TEST_SUITE", config.test.test_suite.to_string());
    env("PYTHON_TEST_SCOPE", config.test.python_test_scope.clone());
    env("PYTHON_TEST_JOBS", config.test.python_test_jobs.to_string());
    if !config.test.cpp_test_args.is_empty() {
        env("CPP_TEST_ARGS", config.test.cpp_test_args.clone());
    }
    if !config.test.python_test_args.is_empty() {
        env("PYTHON_TEST_ARGS", config.test.python_test_args.clone());
    }
    if !config.test.exclude_python_tests.is_empty() {
        env("EXCLUDE_TESTS", config.test.exclude_python_tests.join(","));
    }

    argv.push(config.docker.container_name.clone());
    argv
}

/// Compose argv for tearing containers down
#[must_use]
pub fn down_argv(compose: &ComposeCommand, config: &Config) -> Vec<String> {
    let mut argv = compose.argv_for_file(&config.docker.compose_file);
    argv.push("down".to_string());
    argv.push("--remove-orphans".to_string());
    argv
}

/// Run an argv with inherited stdio and a wall-clock bound, returning the
/// exit code.
async fn run_streaming(argv: &[String], operation: &str, bound: Duration) -> Result<i32> {
    info!("Running: {}", argv.join(" "));
    let mut command = tokio::process::Command::new(&argv[0]);
    command
        .args(&argv[1..])
        // BuildKit enabled on the child only, never the parent environment
        .env("DOCKER_BUILDKIT", "1")
        .kill_on_drop(true);

    match timeout(bound, command.status()).await {
        Ok(Ok(status)) => Ok(status.code().unwrap_or(-1)),
        Ok(Err(source)) => Err(Error::Io {
            source,
            operation: operation.to_string(),
        }),
        Err(_elapsed) => Err(Error::Timeout {
            operation: operation.to_string(),
            seconds: bound.as_secs(),
        }),
    }
}

/// Build the test image via compose.
pub async fn build_image(compose: &ComposeCommand, config: &Config) -> Result<()> {
    let argv = build_argv(compose, config);
    let status = run_streaming(
        &argv,
        "build",
        Duration::from_secs(config.docker.build_timeout),
    )
    .await?;
    if status != 0 {
        return Err(Error::CommandFailed {
            operation: "build".to_string(),
            status,
        });
    }
    Ok(())
}

/// Run the configured test suites, returning the container's exit code.
pub async fn run_tests(compose: &ComposeCommand, config: &Config) -> Result<i32> {
    let argv = run_argv(compose, config);
    run_streaming(&argv, "test run", Duration::from_secs(config.test.timeout)).await
}

/// Tear down containers and networks. Best-effort: failures are logged and
/// swallowed so cleanup can never mask the real outcome of a run.
pub async fn cleanup(compose: &ComposeCommand, config: &Config) {
    let argv = down_argv(compose, config);
    match run_streaming(&argv, "cleanup", Duration::from_secs(300)).await {
        Ok(0) => info!("Containers cleaned up"),
        Ok(status) => warn!("Container cleanup exited with code {status}"),
        Err(err) => warn!("Container cleanup failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btctest_core::config::TestSuite;
    use tempfile::TempDir;

    fn compose() -> ComposeCommand {
        ComposeCommand::from_prefix(vec!["docker".to_string(), "compose".to_string()])
    }

    #[test]
    fn prerequisite_check_requires_both_files() {
        let dir = TempDir::new().unwrap();
        assert!(verify_prerequisite_files(dir.path(), "docker-compose.yml").is_err());

        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        assert!(verify_prerequisite_files(dir.path(), "docker-compose.yml").is_err());

        std::fs::write(dir.path().join("Dockerfile"), "FROM debian\n").unwrap();
        assert!(verify_prerequisite_files(dir.path(), "docker-compose.yml").is_ok());
    }

    #[test]
    fn build_argv_includes_parallel_jobs_when_configured() {
        let mut config = Config::default();
        config.build.parallel_jobs = Some(8);

        let argv = build_argv(&compose(), &config);
        assert_eq!(argv[..5], ["docker", "compose", "-f", "docker-compose.yml", "build"]);
        assert!(argv.contains(&"CMAKE_BUILD_PARALLEL_LEVEL=8".to_string()));
        assert!(argv.contains(&"BUILD_TYPE=RelWithDebInfo".to_string()));
        assert_eq!(argv.last().map(String::as_str), Some("bitcoin-tests"));
    }

    #[test]
    fn build_argv_omits_jobs_for_single_job_builds() {
        let mut config = Config::default();
        config.build.parallel_jobs = Some(1);
        let argv = build_argv(&compose(), &config);
        assert!(!argv.iter().any(|a| a.starts_with("CMAKE_BUILD_PARALLEL_LEVEL")));
    }

    #[test]
    fn run_argv_carries_suite_environment() {
        let mut config = Config::default();
        config.test.test_suite = TestSuite::Python;
        config.test.python_test_scope = "quick".to_string();
        config.test.exclude_python_tests =
            vec!["feature_dbcrash".to_string(), "wallet_backup".to_string()];

        let argv = run_argv(&compose(), &config);
        assert!(argv.contains(&"run".to_string()));
        assert!(argv.contains(&"--rm".to_string()));
        assert!(argv.contains(&"TEST_SUITE=python".to_string()));
        assert!(argv.contains(&"PYTHON_TEST_SCOPE=quick".to_string()));
        assert!(argv.contains(&"PYTHON_TEST_JOBS=4".to_string()));
        assert!(argv.contains(&"EXCLUDE_TESTS=feature_dbcrash,wallet_backup".to_string()));
        assert!(!argv.iter().any(|a| a.starts_with("CPP_TEST_ARGS")));
        assert_eq!(argv.last().map(String::as_str), Some("bitcoin-tests"));
    }

    #[test]
    fn down_argv_removes_orphans() {
        let config = Config::default();
        assert_eq!(
            down_argv(&compose(), &config),
            ["docker", "compose", "-f", "docker-compose.yml", "down", "--remove-orphans"]
        );
    }
}
