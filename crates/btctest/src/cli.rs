//! Command line surface and exit-code mapping

use btctest_core::CliOverrides;
use btctest_core::config::{BuildType, TestSuite};
use clap::Parser;
use std::path::PathBuf;

/// Success exit code
pub const EXIT_OK: i32 = 0;
/// Generic runtime failure
pub const EXIT_GENERIC: i32 = 1;
/// Configuration or usage error
pub const EXIT_CONFIG: i32 = 2;
/// Network connectivity failure
pub const EXIT_NETWORK: i32 = 10;
/// SSL/TLS certificate failure
pub const EXIT_SSL: i32 = 11;
/// Authentication failure
pub const EXIT_AUTH: i32 = 12;
/// Repository access failure
pub const EXIT_REPO: i32 = 13;
/// Out of disk space
pub const EXIT_DISK: i32 = 14;
/// Operation timeout
pub const EXIT_TIMEOUT: i32 = 15;
/// Interrupted by Ctrl-C (128 + SIGINT)
pub const EXIT_SIGINT: i32 = 130;

/// Run the Bitcoin Core test suites (C++ unit tests and Python functional
/// tests) inside Docker.
///
/// The repository is cloned automatically (with caching and retries), the
/// test image is built via docker compose, and the selected suites run in a
/// disposable container.
#[derive(Parser, Debug)]
#[command(name = "btctest")]
#[command(version)]
#[command(about = "Run Bitcoin Core tests (C++ unit tests and Python functional tests) in Docker")]
pub struct Cli {
    /// Git repository URL to clone Bitcoin from
    #[arg(short = 'r', long)]
    pub repo_url: Option<String>,

    /// Branch to clone from the repository
    #[arg(short = 'b', long)]
    pub branch: Option<String>,

    /// CMake build type
    #[arg(long, value_parser = ["Debug", "Release", "RelWithDebInfo", "MinSizeRel"])]
    pub build_type: Option<String>,

    /// Number of parallel build jobs (0 = auto-detect)
    #[arg(long)]
    pub build_jobs: Option<u32>,

    /// Which test suite(s) to run
    #[arg(long, value_parser = ["cpp", "python", "both"])]
    pub test_suite: Option<String>,

    /// Run only C++ unit tests (shortcut for --test-suite cpp)
    #[arg(long)]
    pub cpp_only: bool,

    /// Run only Python functional tests (shortcut for --test-suite python)
    #[arg(long)]
    pub python_only: bool,

    /// Python test scope: 'all', 'standard', 'quick', or specific test name(s)
    #[arg(long)]
    pub python_tests: Option<String>,

    /// Number of parallel jobs for Python tests
    #[arg(long)]
    pub python_jobs: Option<u32>,

    /// Exclude specific Python test(s) (can be used multiple times)
    #[arg(long = "exclude-test")]
    pub exclude_test: Vec<String>,

    /// Keep Docker containers after execution
    #[arg(long)]
    pub keep_containers: bool,

    /// Enable verbose output (debug level logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Path to log file for detailed logging
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Set logging level
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: Option<String>,

    /// Path to .env configuration file to load
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Save current configuration to .env file and exit
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Show what would be executed without running operations
    #[arg(long)]
    pub dry_run: bool,

    /// Show current configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Disable Git repository caching for cloning operations
    #[arg(long)]
    pub no_cache: bool,

    /// Remove all cached repositories and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Report resource usage statistics for the clone phase
    #[arg(long)]
    pub performance_monitor: bool,
}

impl Cli {
    /// Translate the parsed flags into config-layer overrides.
    ///
    /// `--cpp-only` / `--python-only` win over `--test-suite`, with
    /// `--python-only` checked last (original precedence).
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        let mut suite = self
            .test_suite
            .as_deref()
            .and_then(|s| s.parse::<TestSuite>().ok());
        if self.cpp_only {
            suite = Some(TestSuite::Cpp);
        }
        if self.python_only {
            suite = Some(TestSuite::Python);
        }

        CliOverrides {
            repo_url: self.repo_url.clone(),
            branch: self.branch.clone(),
            build_type: self
                .build_type
                .as_deref()
                .and_then(|s| s.parse::<BuildType>().ok()),
            build_jobs: self.build_jobs,
            test_suite: suite,
            python_test_scope: self.python_tests.clone(),
            python_test_jobs: self.python_jobs,
            exclude_tests: self.exclude_test.clone(),
            keep_containers: self.keep_containers,
            verbose: self.verbose,
            quiet: self.quiet,
            log_file: self.log_file.clone(),
            log_level: self.log_level.clone(),
            config_file: self.config.clone(),
            dry_run: self.dry_run,
            no_cache: self.no_cache,
        }
    }
}

/// Map a classified clone error onto the per-category exit codes.
#[must_use]
pub fn exit_code_for_clone(err: &btctest_vcs::Error) -> i32 {
    use btctest_vcs::Error;
    match err {
        Error::Network { .. } => EXIT_NETWORK,
        Error::Ssl { .. } => EXIT_SSL,
        Error::Authentication { .. } => EXIT_AUTH,
        Error::Repository { .. } => EXIT_REPO,
        Error::DiskSpace { .. } => EXIT_DISK,
        Error::Timeout { .. } => EXIT_TIMEOUT,
        Error::Generic { .. } => EXIT_GENERIC,
    }
}

/// Map a Docker error onto exit codes: timeouts share the timeout category,
/// everything else is a generic runtime failure.
#[must_use]
pub fn exit_code_for_docker(err: &btctest_docker::Error) -> i32 {
    match err {
        btctest_docker::Error::Timeout { .. } => EXIT_TIMEOUT,
        _ => EXIT_GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_overrides_empty() {
        let cli = Cli::try_parse_from(["btctest"]).unwrap();
        let overrides = cli.overrides();
        assert!(overrides.repo_url.is_none());
        assert!(overrides.test_suite.is_none());
        assert!(!overrides.no_cache);
        assert!(overrides.exclude_tests.is_empty());
    }

    #[test]
    fn suite_shortcuts_override_test_suite_flag() {
        let cli = Cli::try_parse_from(["btctest", "--test-suite", "both", "--cpp-only"]).unwrap();
        assert_eq!(cli.overrides().test_suite, Some(TestSuite::Cpp));

        let cli = Cli::try_parse_from(["btctest", "--cpp-only", "--python-only"]).unwrap();
        assert_eq!(cli.overrides().test_suite, Some(TestSuite::Python));
    }

    #[test]
    fn invalid_choices_are_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["btctest", "--test-suite", "rust"]).is_err());
        assert!(Cli::try_parse_from(["btctest", "--build-type", "Fast"]).is_err());
        assert!(Cli::try_parse_from(["btctest", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn exclude_test_accumulates() {
        let cli = Cli::try_parse_from([
            "btctest",
            "--exclude-test",
            "feature_dbcrash",
            "--exclude-test",
            "wallet_backup",
        ])
        .unwrap();
        assert_eq!(
            cli.overrides().exclude_tests,
            ["feature_dbcrash", "wallet_backup"]
        );
    }

    #[test]
    fn repo_and_branch_short_flags_parse() {
        let cli = Cli::try_parse_from([
            "btctest",
            "-r",
            "https://example.com/fork.git",
            "-b",
            "feature",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.repo_url.as_deref(), Some("https://example.com/fork.git"));
        assert_eq!(overrides.branch.as_deref(), Some("feature"));
    }

    #[test]
    fn clone_errors_map_to_distinct_exit_codes() {
        use btctest_vcs::Error;
        let cases: [(Error, i32); 7] = [
            (
                Error::Network {
                    message: String::new(),
                    attempts: 3,
                },
                EXIT_NETWORK,
            ),
            (
                Error::Ssl {
                    message: String::new(),
                },
                EXIT_SSL,
            ),
            (
                Error::Authentication {
                    message: String::new(),
                },
                EXIT_AUTH,
            ),
            (
                Error::Repository {
                    message: String::new(),
                },
                EXIT_REPO,
            ),
            (
                Error::DiskSpace {
                    message: String::new(),
                },
                EXIT_DISK,
            ),
            (
                Error::Timeout {
                    seconds: 600,
                    attempts: 3,
                },
                EXIT_TIMEOUT,
            ),
            (
                Error::Generic {
                    message: String::new(),
                    attempts: 3,
                },
                EXIT_GENERIC,
            ),
        ];
        let mut seen = std::collections::BTreeSet::new();
        for (err, expected) in &cases {
            assert_eq!(exit_code_for_clone(err), *expected);
            seen.insert(*expected);
        }
        // All categories are distinguishable
        assert_eq!(seen.len(), cases.len());
    }

    #[test]
    fn docker_timeout_maps_to_timeout_exit_code() {
        let err = btctest_docker::Error::Timeout {
            operation: "build".to_string(),
            seconds: 1800,
        };
        assert_eq!(exit_code_for_docker(&err), EXIT_TIMEOUT);
        assert_eq!(
            exit_code_for_docker(&btctest_docker::Error::ComposeUnavailable),
            EXIT_GENERIC
        );
    }
}
