//! Layered configuration for the btctest runner
//!
//! Settings are resolved from four sources, highest precedence first:
//!
//! 1. Command line overrides ([`CliOverrides`])
//! 2. Process environment variables (`BTC_*`)
//! 3. `.env` files (`.env`, `.env.local`, `.env.production`, `.env.development`)
//! 4. Built-in defaults
//!
//! `.env` values are kept in a side map rather than written into the process
//! environment, so they can never shadow real environment variables.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// `.env` files probed in the working directory, in load order.
///
/// The first file that defines a key wins; later files only fill gaps.
pub const ENV_FILES: [&str; 4] = [".env", ".env.local", ".env.production", ".env.development"];

/// CMake build type for the Bitcoin Core image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildType {
    /// Unoptimized build with debug info
    Debug,
    /// Optimized build
    Release,
    /// Optimized build with debug info (default)
    #[default]
    RelWithDebInfo,
    /// Size-optimized build
    MinSizeRel,
}

impl BuildType {
    /// The CMake spelling of this build type
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
            Self::RelWithDebInfo => "RelWithDebInfo",
            Self::MinSizeRel => "MinSizeRel",
        }
    }
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Debug" => Ok(Self::Debug),
            "Release" => Ok(Self::Release),
            "RelWithDebInfo" => Ok(Self::RelWithDebInfo),
            "MinSizeRel" => Ok(Self::MinSizeRel),
            _ => Err(format!(
                "invalid build type '{s}' (expected Debug, Release, RelWithDebInfo or MinSizeRel)"
            )),
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which test suites to run inside the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestSuite {
    /// C++ unit tests only
    Cpp,
    /// Python functional tests only
    Python,
    /// Both suites (default)
    #[default]
    Both,
}

impl TestSuite {
    /// The value passed to the container via `TEST_SUITE`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpp => "cpp",
            Self::Python => "python",
            Self::Both => "both",
        }
    }

    /// Human-readable suite description for progress output
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Cpp => "C++ unit tests",
            Self::Python => "Python functional tests",
            Self::Both => "C++ unit tests and Python functional tests",
        }
    }
}

impl FromStr for TestSuite {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cpp" => Ok(Self::Cpp),
            "python" => Ok(Self::Python),
            "both" => Ok(Self::Both),
            _ => Err(format!(
                "invalid test suite '{s}' (expected cpp, python or both)"
            )),
        }
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository clone settings
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Git repository URL to clone
    pub url: String,
    /// Branch to clone
    pub branch: String,
    /// Per-attempt clone timeout in seconds
    pub clone_timeout: u64,
    /// Maximum clone attempts
    pub clone_retries: u32,
    /// Fixed delay between clone attempts in seconds
    pub clone_retry_delay: u64,
    /// Whether to clone with `--depth`
    pub shallow_clone: bool,
    /// Depth used for shallow clones
    pub clone_depth: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: "https://github.com/bitcoin/bitcoin".to_string(),
            branch: "master".to_string(),
            clone_timeout: 600,
            clone_retries: 3,
            clone_retry_delay: 10,
            shallow_clone: true,
            clone_depth: 1,
        }
    }
}

/// Bitcoin Core build settings
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// CMake build type
    pub build_type: BuildType,
    /// Parallel build jobs; `None` lets the tool auto-detect
    pub parallel_jobs: Option<u32>,
    /// Whether the image build enables the test binaries
    pub enable_tests: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_type: BuildType::default(),
            parallel_jobs: None,
            enable_tests: true,
        }
    }
}

/// Docker / compose settings
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Compose file describing the test service
    pub compose_file: String,
    /// Image build timeout in seconds
    pub build_timeout: u64,
    /// Compose service / container base name
    pub container_name: String,
    /// Keep containers around after the run instead of `compose down`
    pub keep_containers: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            compose_file: "docker-compose.yml".to_string(),
            build_timeout: 1800,
            container_name: "bitcoin-tests".to_string(),
            keep_containers: false,
        }
    }
}

/// Network and clone-cache settings
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Per-attempt timeout for short git operations in seconds
    pub timeout: u64,
    /// Retry attempts for short git operations
    pub retries: u32,
    /// Fixed delay between retries in seconds
    pub retry_delay: u64,
    /// Whether cloned repositories are cached for reuse
    pub use_git_cache: bool,
    /// Cache directory override; `None` selects the platform default
    pub cache_dir: Option<PathBuf>,
    /// Cache size cap in gigabytes
    pub max_cache_size_gb: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 300,
            retries: 3,
            retry_delay: 5,
            use_git_cache: true,
            cache_dir: None,
            max_cache_size_gb: 10.0,
        }
    }
}

/// Test execution settings
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Overall test-run timeout in seconds
    pub timeout: u64,
    /// Which suites to run
    pub test_suite: TestSuite,
    /// Python test scope: `all`, `standard`, `quick`, or test name(s)
    pub python_test_scope: String,
    /// Parallel jobs for the Python functional runner
    pub python_test_jobs: u32,
    /// Extra arguments for the C++ `test_bitcoin` binary
    pub cpp_test_args: String,
    /// Extra arguments for the Python `test_runner.py`
    pub python_test_args: String,
    /// Python tests excluded from the run
    pub exclude_python_tests: Vec<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            timeout: 3600,
            test_suite: TestSuite::default(),
            python_test_scope: "standard".to_string(),
            python_test_jobs: 4,
            cpp_test_args: String::new(),
            python_test_args: String::new(),
            exclude_python_tests: Vec::new(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level name (trace, debug, info, warn, error)
    pub level: String,
    /// Optional log file receiving a plain-text copy of all events
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Fully resolved runner configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Repository clone settings
    pub repository: RepositoryConfig,
    /// Build settings
    pub build: BuildConfig,
    /// Docker settings
    pub docker: DockerConfig,
    /// Network and cache settings
    pub network: NetworkConfig,
    /// Test execution settings
    pub test: TestConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Print the plan without executing anything
    pub dry_run: bool,
    /// Debug-level output
    pub verbose: bool,
    /// Errors-only output
    pub quiet: bool,
}

/// Command line values layered on top of environment and file sources.
///
/// Every field is optional; `None` means "not given on the command line".
/// Keeping this clap-free lets the config layer be tested without a CLI.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--repo-url`
    pub repo_url: Option<String>,
    /// `--branch`
    pub branch: Option<String>,
    /// `--build-type`
    pub build_type: Option<BuildType>,
    /// `--build-jobs` (0 means auto-detect)
    pub build_jobs: Option<u32>,
    /// `--test-suite` / `--cpp-only` / `--python-only`
    pub test_suite: Option<TestSuite>,
    /// `--python-tests`
    pub python_test_scope: Option<String>,
    /// `--python-jobs`
    pub python_test_jobs: Option<u32>,
    /// `--exclude-test` occurrences
    pub exclude_tests: Vec<String>,
    /// `--keep-containers`
    pub keep_containers: bool,
    /// `--verbose`
    pub verbose: bool,
    /// `--quiet`
    pub quiet: bool,
    /// `--log-file`
    pub log_file: Option<PathBuf>,
    /// `--log-level`
    pub log_level: Option<String>,
    /// `--config`: explicit env file loaded ahead of the standard ones
    pub config_file: Option<PathBuf>,
    /// `--dry-run`
    pub dry_run: bool,
    /// `--no-cache`
    pub no_cache: bool,
}

/// Environment lookup that layers the process environment over `.env` values
struct EnvLookup {
    file_values: BTreeMap<String, String>,
}

impl EnvLookup {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .or_else(|| self.file_values.get(name).cloned())
    }

    fn string(&self, name: &str, default: String) -> String {
        self.get(name).unwrap_or(default)
    }

    fn u64(&self, name: &str, default: u64) -> u64 {
        self.parsed(name, default)
    }

    fn u32(&self, name: &str, default: u32) -> u32 {
        self.parsed(name, default)
    }

    fn parsed<T: FromStr + Copy + fmt::Display>(&self, name: &str, default: T) -> T {
        match self.get(name) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid value for {name}={raw}, using default {default}");
                default
            }),
        }
    }

    fn bool(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            None => default,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!("Invalid value for {name}={raw}, using default {default}");
                default
            }),
        }
    }
}

/// Parse a permissive boolean: `true/1/yes/on` and `false/0/no/off`
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse the body of a `.env` file into a key/value map.
///
/// Supports `#` comments, blank lines, `export ` prefixes and single or
/// double quoted values. Within one file the last assignment wins.
fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        values.insert(key.to_string(), value.to_string());
    }
    values
}

/// Load `.env` sources: the explicit file (if any) first, then the standard
/// file list. The first source defining a key wins.
fn load_env_files(dir: &Path, explicit: Option<&Path>) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    let standard = ENV_FILES.iter().map(|name| dir.join(name));
    let candidates = explicit.map(Path::to_path_buf).into_iter().chain(standard);
    for path in candidates {
        let Ok(content) = std::fs::read_to_string(&path) else {
            debug!("Environment file {} not readable, skipping", path.display());
            continue;
        };
        debug!("Loading configuration from {}", path.display());
        for (key, value) in parse_env_file(&content) {
            merged.entry(key).or_insert(value);
        }
    }
    merged
}

impl Config {
    /// Load configuration from the current directory's `.env` files, the
    /// process environment and the given CLI overrides.
    pub fn load(overrides: &CliOverrides) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| Error::io_no_path(e, "current_dir"))?;
        Self::load_from(&cwd, overrides)
    }

    /// Like [`Config::load`] but resolving `.env` files relative to `dir`.
    pub fn load_from(dir: &Path, overrides: &CliOverrides) -> Result<Self> {
        let env = EnvLookup {
            file_values: load_env_files(dir, overrides.config_file.as_deref()),
        };

        let mut config = Self::default();
        config.apply_env(&env);
        config.apply_overrides(overrides);

        let errors = config.validate();
        if errors.is_empty() {
            debug!("Configuration loaded successfully");
            Ok(config)
        } else {
            Err(Error::configuration(errors.join("; ")))
        }
    }

    fn apply_env(&mut self, env: &EnvLookup) {
        let d = Self::default();

        self.repository.url = env.string("BTC_REPO_URL", d.repository.url);
        self.repository.branch = env.string("BTC_REPO_BRANCH", d.repository.branch);
        self.repository.clone_timeout = env.u64("BTC_CLONE_TIMEOUT", d.repository.clone_timeout);
        self.repository.clone_retries = env.u32("BTC_CLONE_RETRIES", d.repository.clone_retries);
        self.repository.shallow_clone = env.bool("BTC_SHALLOW_CLONE", d.repository.shallow_clone);

        if let Some(raw) = env.get("BTC_BUILD_TYPE") {
            match raw.parse() {
                Ok(build_type) => self.build.build_type = build_type,
                Err(err) => warn!("Ignoring BTC_BUILD_TYPE: {err}"),
            }
        }
        if let Some(raw) = env.get("BTC_BUILD_JOBS") {
            match raw.parse::<u32>() {
                Ok(0) => self.build.parallel_jobs = None,
                Ok(jobs) => self.build.parallel_jobs = Some(jobs),
                Err(_) => warn!("Invalid value for BTC_BUILD_JOBS={raw}, using auto-detect"),
            }
        }
        self.build.enable_tests = env.bool("BTC_ENABLE_TESTS", d.build.enable_tests);

        self.docker.compose_file = env.string("BTC_COMPOSE_FILE", d.docker.compose_file);
        self.docker.container_name = env.string("BTC_CONTAINER_NAME", d.docker.container_name);
        self.docker.keep_containers =
            env.bool("BTC_KEEP_CONTAINERS", d.docker.keep_containers);

        self.network.timeout = env.u64("BTC_NETWORK_TIMEOUT", d.network.timeout);
        self.network.retries = env.u32("BTC_NETWORK_RETRIES", d.network.retries);

        self.test.timeout = env.u64("BTC_TEST_TIMEOUT", d.test.timeout);
        if let Some(raw) = env.get("BTC_TEST_SUITE") {
            match raw.parse() {
                Ok(suite) => self.test.test_suite = suite,
                Err(err) => warn!("Ignoring BTC_TEST_SUITE: {err}"),
            }
        }
        self.test.python_test_scope =
            env.string("BTC_PYTHON_TEST_SCOPE", d.test.python_test_scope);
        self.test.python_test_jobs = env.u32("BTC_PYTHON_TEST_JOBS", d.test.python_test_jobs);
        self.test.cpp_test_args = env.string("BTC_CPP_TEST_ARGS", d.test.cpp_test_args);
        self.test.python_test_args =
            env.string("BTC_PYTHON_TEST_ARGS", d.test.python_test_args);

        self.logging.level = env.string("BTC_LOG_LEVEL", d.logging.level);
        if let Some(file) = env.get("BTC_LOG_FILE").filter(|s| !s.trim().is_empty()) {
            self.logging.file = Some(PathBuf::from(file));
        }

        self.dry_run = env.bool("BTC_DRY_RUN", d.dry_run);
        self.verbose = env.bool("BTC_VERBOSE", d.verbose);
        self.quiet = env.bool("BTC_QUIET", d.quiet);
    }

    fn apply_overrides(&mut self, cli: &CliOverrides) {
        if let Some(url) = &cli.repo_url {
            self.repository.url = url.clone();
        }
        if let Some(branch) = &cli.branch {
            self.repository.branch = branch.clone();
        }
        if let Some(build_type) = cli.build_type {
            self.build.build_type = build_type;
        }
        if let Some(jobs) = cli.build_jobs {
            self.build.parallel_jobs = if jobs == 0 { None } else { Some(jobs) };
        }
        if let Some(suite) = cli.test_suite {
            self.test.test_suite = suite;
        }
        if let Some(scope) = &cli.python_test_scope {
            self.test.python_test_scope = scope.clone();
        }
        if let Some(jobs) = cli.python_test_jobs {
            self.test.python_test_jobs = jobs;
        }
        if !cli.exclude_tests.is_empty() {
            self.test.exclude_python_tests = cli.exclude_tests.clone();
        }
        if cli.keep_containers {
            self.docker.keep_containers = true;
        }
        if cli.verbose {
            self.verbose = true;
            self.logging.level = "debug".to_string();
        }
        if cli.quiet {
            self.quiet = true;
            self.logging.level = "error".to_string();
        }
        if let Some(file) = &cli.log_file {
            self.logging.file = Some(file.clone());
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if cli.dry_run {
            self.dry_run = true;
        }
        if cli.no_cache {
            self.network.use_git_cache = false;
        }
    }

    /// Validate the resolved configuration, returning every violation.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.repository.url.trim().is_empty() {
            errors.push("repository URL cannot be empty".to_string());
        }
        if self.repository.url.len() > 2048 {
            errors.push("repository URL too long (max 2048 characters)".to_string());
        }
        if self.repository.clone_timeout < 30 {
            errors.push("clone timeout must be at least 30 seconds".to_string());
        }
        if self.repository.clone_retries < 1 {
            errors.push("clone retries must be >= 1".to_string());
        }
        if self.test.timeout < 60 {
            errors.push("test timeout must be at least 60 seconds".to_string());
        }
        if self.build.parallel_jobs == Some(0) {
            errors.push("parallel build jobs must be >= 1".to_string());
        }
        if self.test.python_test_jobs < 1 {
            errors.push("Python test jobs must be >= 1".to_string());
        }
        if self.network.max_cache_size_gb <= 0.0 {
            errors.push("cache size cap must be positive".to_string());
        }

        errors
    }

    /// Human-readable configuration summary for startup output
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Bitcoin Core Tests Runner Configuration".to_string(),
            "=".repeat(40),
            format!(
                "Repository: {} (branch: {})",
                self.repository.url, self.repository.branch
            ),
            format!("Build Type: {}", self.build.build_type),
            format!(
                "Parallel Jobs: {}",
                self.build
                    .parallel_jobs
                    .map_or_else(|| "auto".to_string(), |j| j.to_string())
            ),
            format!("Test Suite: {}", self.test.test_suite),
            format!("Test Timeout: {}s", self.test.timeout),
            format!("Log Level: {}", self.logging.level),
            format!("Git Cache: {}", self.network.use_git_cache),
            format!("Dry Run: {}", self.dry_run),
        ];

        if matches!(self.test.test_suite, TestSuite::Python | TestSuite::Both) {
            lines.push(format!(
                "Python Test Scope: {}",
                self.test.python_test_scope
            ));
            lines.push(format!("Python Test Jobs: {}", self.test.python_test_jobs));
        }
        if let Some(file) = &self.logging.file {
            lines.push(format!("Log File: {}", file.display()));
        }

        lines.join("\n")
    }

    /// Write the configuration back out as a `BTC_*` env file.
    pub fn save_env_file(&self, path: &Path) -> Result<()> {
        let lines = [
            "# Bitcoin Core Tests Runner Configuration".to_string(),
            "# Generated automatically - edit as needed".to_string(),
            String::new(),
            format!("BTC_REPO_URL={}", self.repository.url),
            format!("BTC_REPO_BRANCH={}", self.repository.branch),
            format!("BTC_CLONE_TIMEOUT={}", self.repository.clone_timeout),
            format!("BTC_CLONE_RETRIES={}", self.repository.clone_retries),
            format!("BTC_SHALLOW_CLONE={}", self.repository.shallow_clone),
            String::new(),
            format!("BTC_BUILD_TYPE={}", self.build.build_type),
            format!(
                "BTC_BUILD_JOBS={}",
                self.build.parallel_jobs.unwrap_or(0)
            ),
            format!("BTC_ENABLE_TESTS={}", self.build.enable_tests),
            String::new(),
            format!("BTC_COMPOSE_FILE={}", self.docker.compose_file),
            format!("BTC_CONTAINER_NAME={}", self.docker.container_name),
            format!("BTC_KEEP_CONTAINERS={}", self.docker.keep_containers),
            String::new(),
            format!("BTC_NETWORK_TIMEOUT={}", self.network.timeout),
            format!("BTC_NETWORK_RETRIES={}", self.network.retries),
            String::new(),
            format!("BTC_TEST_TIMEOUT={}", self.test.timeout),
            format!("BTC_TEST_SUITE={}", self.test.test_suite),
            format!("BTC_PYTHON_TEST_SCOPE={}", self.test.python_test_scope),
            format!("BTC_PYTHON_TEST_JOBS={}", self.test.python_test_jobs),
            String::new(),
            format!("BTC_LOG_LEVEL={}", self.logging.level),
            format!(
                "BTC_LOG_FILE={}",
                self.logging
                    .file
                    .as_ref()
                    .map_or_else(String::new, |p| p.display().to_string())
            ),
            String::new(),
            format!("BTC_DRY_RUN={}", self.dry_run),
            format!("BTC_VERBOSE={}", self.verbose),
            format!("BTC_QUIET={}", self.quiet),
        ];
        std::fs::write(path, lines.join("\n") + "\n").map_err(|e| Error::io(e, path, "write"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn empty_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn defaults_are_the_documented_ones() {
        let config = Config::default();
        assert_eq!(config.repository.url, "https://github.com/bitcoin/bitcoin");
        assert_eq!(config.repository.branch, "master");
        assert_eq!(config.repository.clone_timeout, 600);
        assert_eq!(config.build.build_type, BuildType::RelWithDebInfo);
        assert_eq!(config.test.test_suite, TestSuite::Both);
        assert_eq!(config.test.python_test_jobs, 4);
        assert!(config.network.use_git_cache);
        assert!((config.network.max_cache_size_gb - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn env_vars_override_defaults() {
        let dir = empty_dir();
        temp_env::with_vars(
            [
                ("BTC_REPO_BRANCH", Some("v27.x")),
                ("BTC_CLONE_TIMEOUT", Some("120")),
                ("BTC_KEEP_CONTAINERS", Some("yes")),
            ],
            || {
                let config = Config::load_from(dir.path(), &CliOverrides::default()).unwrap();
                assert_eq!(config.repository.branch, "v27.x");
                assert_eq!(config.repository.clone_timeout, 120);
                assert!(config.docker.keep_containers);
            },
        );
    }

    #[test]
    fn cli_overrides_beat_env_vars() {
        let dir = empty_dir();
        temp_env::with_vars([("BTC_REPO_BRANCH", Some("from-env"))], || {
            let overrides = CliOverrides {
                branch: Some("from-cli".to_string()),
                ..CliOverrides::default()
            };
            let config = Config::load_from(dir.path(), &overrides).unwrap();
            assert_eq!(config.repository.branch, "from-cli");
        });
    }

    #[test]
    fn env_file_is_lowest_precedence_source() {
        let dir = empty_dir();
        std::fs::write(
            dir.path().join(".env"),
            "BTC_REPO_BRANCH=from-file\nBTC_PYTHON_TEST_JOBS=8\n",
        )
        .unwrap();

        temp_env::with_vars([("BTC_REPO_BRANCH", Some("from-env"))], || {
            let config = Config::load_from(dir.path(), &CliOverrides::default()).unwrap();
            // Real env var wins over the file value
            assert_eq!(config.repository.branch, "from-env");
            // File value applies where the env is silent
            assert_eq!(config.test.python_test_jobs, 8);
        });
    }

    #[test]
    fn first_env_file_wins_across_the_list() {
        let dir = empty_dir();
        std::fs::write(dir.path().join(".env"), "BTC_REPO_BRANCH=primary\n").unwrap();
        std::fs::write(dir.path().join(".env.local"), "BTC_REPO_BRANCH=secondary\n").unwrap();

        temp_env::with_vars([("BTC_REPO_BRANCH", None::<&str>)], || {
            let config = Config::load_from(dir.path(), &CliOverrides::default()).unwrap();
            assert_eq!(config.repository.branch, "primary");
        });
    }

    #[test]
    fn explicit_config_file_beats_standard_files() {
        let dir = empty_dir();
        std::fs::write(dir.path().join(".env"), "BTC_REPO_BRANCH=standard\n").unwrap();
        let custom = dir.path().join("custom.env");
        std::fs::write(&custom, "BTC_REPO_BRANCH=custom\n").unwrap();

        temp_env::with_vars([("BTC_REPO_BRANCH", None::<&str>)], || {
            let overrides = CliOverrides {
                config_file: Some(custom.clone()),
                ..CliOverrides::default()
            };
            let config = Config::load_from(dir.path(), &overrides).unwrap();
            assert_eq!(config.repository.branch, "custom");
        });
    }

    #[test]
    fn invalid_env_value_falls_back_to_default() {
        let dir = empty_dir();
        temp_env::with_vars([("BTC_CLONE_TIMEOUT", Some("not-a-number"))], || {
            let config = Config::load_from(dir.path(), &CliOverrides::default()).unwrap();
            assert_eq!(config.repository.clone_timeout, 600);
        });
    }

    #[test]
    fn bool_parsing_accepts_all_documented_spellings() {
        for raw in ["true", "1", "yes", "on", "TRUE", "Yes"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["false", "0", "no", "off", "OFF"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn verbose_and_quiet_adjust_log_level() {
        let dir = empty_dir();
        temp_env::with_vars([("BTC_LOG_LEVEL", None::<&str>)], || {
            let overrides = CliOverrides {
                verbose: true,
                ..CliOverrides::default()
            };
            let config = Config::load_from(dir.path(), &overrides).unwrap();
            assert_eq!(config.logging.level, "debug");

            let overrides = CliOverrides {
                quiet: true,
                ..CliOverrides::default()
            };
            let config = Config::load_from(dir.path(), &overrides).unwrap();
            assert_eq!(config.logging.level, "error");
        });
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.repository.url = String::new();
        config.repository.clone_timeout = 5;
        config.test.timeout = 10;
        config.test.python_test_jobs = 0;

        let errors = config.validate();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("URL")));
        assert!(errors.iter().any(|e| e.contains("clone timeout")));
    }

    #[test]
    fn load_fails_on_invalid_configuration() {
        let dir = empty_dir();
        temp_env::with_vars([("BTC_TEST_TIMEOUT", Some("10"))], || {
            let result = Config::load_from(dir.path(), &CliOverrides::default());
            assert!(result.is_err());
        });
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = empty_dir();
        let mut config = Config::default();
        config.repository.branch = "v28.0".to_string();
        config.test.python_test_jobs = 2;

        let path = dir.path().join("saved.env");
        config.save_env_file(&path).unwrap();

        temp_env::with_vars(
            [
                ("BTC_REPO_BRANCH", None::<&str>),
                ("BTC_PYTHON_TEST_JOBS", None::<&str>),
            ],
            || {
                let overrides = CliOverrides {
                    config_file: Some(path.clone()),
                    ..CliOverrides::default()
                };
                let reloaded = Config::load_from(dir.path(), &overrides).unwrap();
                assert_eq!(reloaded.repository.branch, "v28.0");
                assert_eq!(reloaded.test.python_test_jobs, 2);
            },
        );
    }

    #[test]
    fn summary_mentions_the_important_settings() {
        let config = Config::default();
        let summary = config.summary();
        assert!(summary.contains("https://github.com/bitcoin/bitcoin"));
        assert!(summary.contains("RelWithDebInfo"));
        assert!(summary.contains("Python Test Scope: standard"));
    }

    #[test]
    fn env_file_parser_handles_quotes_comments_and_export() {
        let parsed = parse_env_file(
            "# comment\n\nexport BTC_REPO_URL=\"https://example.com/r.git\"\nBTC_REPO_BRANCH='main'\nBROKEN LINE\n",
        );
        assert_eq!(
            parsed.get("BTC_REPO_URL").map(String::as_str),
            Some("https://example.com/r.git")
        );
        assert_eq!(parsed.get("BTC_REPO_BRANCH").map(String::as_str), Some("main"));
        assert_eq!(parsed.len(), 2);
    }
}
