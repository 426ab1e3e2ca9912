//! Bounded, retrying execution of external commands
//!
//! Every attempt gets an independent wall-clock budget; a timed-out child is
//! killed rather than left running. Failures are classified from the process
//! output: permanent categories (SSL, disk space, repository, authentication)
//! fail on the first attempt, transient ones (network, generic) are retried
//! with a fixed delay until the attempt budget is exhausted.

use crate::classify::{ErrorKind, classify};
use crate::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Retry behavior for one command invocation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first (>= 1)
    pub max_retries: u32,
    /// Wall-clock bound per attempt
    pub timeout: Duration,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(300),
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit code (0 on this path)
    pub exit_code: i32,
}

/// Run `argv` under the given policy, retrying transient failures.
///
/// `description` only feeds progress logging. Classification looks at stderr
/// and falls back to stdout when stderr is empty.
pub async fn run_with_retry(
    argv: &[String],
    description: &str,
    policy: &RetryPolicy,
    cwd: Option<&Path>,
) -> Result<ProcessOutput> {
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::Generic {
            message: "empty command line".to_string(),
            attempts: 0,
        });
    };
    let max_attempts = policy.max_retries.max(1);

    for attempt in 1..=max_attempts {
        debug!(
            "Running {description} (attempt {attempt}/{max_attempts}): {}",
            argv.join(" ")
        );

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let attempt_result = timeout(policy.timeout, command.output()).await;
        let retries_left = attempt < max_attempts;

        let failure = match attempt_result {
            Err(_elapsed) => {
                // Child is killed when the output future is dropped
                if retries_left {
                    warn!(
                        "{description} timed out (attempt {attempt}/{max_attempts}), \
                         retrying in {:?}",
                        policy.retry_delay
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                    continue;
                }
                return Err(Error::Timeout {
                    seconds: policy.timeout.as_secs(),
                    attempts: max_attempts,
                });
            }
            Ok(Err(spawn_err)) => spawn_err.to_string(),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                if output.status.success() {
                    debug!("{description} completed successfully");
                    return Ok(ProcessOutput {
                        stdout,
                        stderr,
                        exit_code: output.status.code().unwrap_or(0),
                    });
                }
                let message = stderr.trim().to_string();
                if message.is_empty() {
                    stdout.trim().to_string()
                } else {
                    message
                }
            }
        };

        match classify(&failure) {
            ErrorKind::Ssl => return Err(Error::Ssl { message: failure }),
            ErrorKind::DiskSpace => return Err(Error::DiskSpace { message: failure }),
            ErrorKind::Repository => return Err(Error::Repository { message: failure }),
            ErrorKind::Authentication => {
                return Err(Error::Authentication { message: failure });
            }
            ErrorKind::Network => {
                if retries_left {
                    warn!(
                        "Network error during {description} \
                         (attempt {attempt}/{max_attempts}): {failure}; \
                         retrying in {:?}",
                        policy.retry_delay
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                    continue;
                }
                return Err(Error::Network {
                    message: failure,
                    attempts: max_attempts,
                });
            }
            ErrorKind::Generic => {
                if retries_left {
                    warn!(
                        "{description} failed (attempt {attempt}/{max_attempts}): {failure}; \
                         retrying in {:?}",
                        policy.retry_delay
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                    continue;
                }
                return Err(Error::Generic {
                    message: failure,
                    attempts: max_attempts,
                });
            }
        }
    }

    // The loop always returns on its last attempt
    Err(Error::Generic {
        message: format!("{description} failed with unknown error"),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            timeout: Duration::from_secs(10),
            retry_delay: Duration::from_millis(10),
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn success_returns_captured_output() {
        let output = run_with_retry(
            &sh("echo hello; echo world >&2"),
            "echo",
            &fast_policy(3),
            None,
        )
        .await
        .unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("hello"));
        assert!(output.stderr.contains("world"));
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let result = run_with_retry(&[], "nothing", &fast_policy(3), None).await;
        assert!(matches!(result, Err(Error::Generic { .. })));
    }

    #[tokio::test]
    async fn respects_working_directory() {
        let dir = TempDir::new().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let output = run_with_retry(&sh("pwd"), "pwd", &fast_policy(1), Some(dir.path()))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), expected.to_string_lossy());
    }

    #[tokio::test]
    async fn authentication_fails_on_first_attempt() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("attempts");
        let script = format!(
            "echo x >> {}; echo 'fatal: Authentication failed' >&2; exit 128",
            marker.display()
        );

        let result = run_with_retry(&sh(&script), "auth failure", &fast_policy(3), None).await;
        assert!(matches!(result, Err(Error::Authentication { .. })));

        let attempts = std::fs::read_to_string(&marker).unwrap().lines().count();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn network_error_retried_until_success() {
        let dir = TempDir::new().unwrap();
        let counter = dir.path().join("counter");
        let script = format!(
            "n=$(cat {c} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {c}; \
             if [ $n -lt 3 ]; then echo 'Could not resolve host: example.com' >&2; exit 128; fi; \
             echo cloned",
            c = counter.display()
        );

        let output = run_with_retry(&sh(&script), "flaky clone", &fast_policy(3), None)
            .await
            .unwrap();
        assert!(output.stdout.contains("cloned"));
        assert_eq!(std::fs::read_to_string(&counter).unwrap().trim(), "3");
    }

    #[tokio::test]
    async fn network_error_exhausts_retries() {
        let result = run_with_retry(
            &sh("echo 'connection refused' >&2; exit 1"),
            "down host",
            &fast_policy(2),
            None,
        )
        .await;
        match result {
            Err(Error::Network { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generic_error_exhausts_retries() {
        let result = run_with_retry(
            &sh("echo 'some unexpected failure' >&2; exit 1"),
            "broken",
            &fast_policy(2),
            None,
        )
        .await;
        match result {
            Err(Error::Generic { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected generic error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stdout_is_classified_when_stderr_empty() {
        let result = run_with_retry(
            &sh("echo 'remote: Repository not found.'; exit 1"),
            "stdout only",
            &fast_policy(3),
            None,
        )
        .await;
        assert!(matches!(result, Err(Error::Repository { .. })));
    }

    #[tokio::test]
    async fn timeout_is_reported_after_all_attempts() {
        let policy = RetryPolicy {
            max_retries: 2,
            timeout: Duration::from_millis(100),
            retry_delay: Duration::from_millis(10),
        };
        let result = run_with_retry(
            &["sleep".to_string(), "5".to_string()],
            "sleeper",
            &policy,
            None,
        )
        .await;
        match result {
            Err(Error::Timeout { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
