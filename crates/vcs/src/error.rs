//! Classified error taxonomy for git operations
//!
//! The retrying process runner is the only place these are constructed; the
//! cache and the clone orchestrator pass them through unchanged. Each variant
//! keeps the raw process output in its message so diagnostics survive to the
//! CLI boundary.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for git execution, classified by failure category
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// SSL/TLS certificate validation failed; permanent, never retried
    #[error("SSL certificate error: {message}")]
    #[diagnostic(
        code(btctest::vcs::ssl),
        help(
            "This might be due to firewall restrictions or certificate issues. \
             You can try HTTP instead of HTTPS if the repository allows it."
        )
    )]
    Ssl {
        /// Raw process output
        message: String,
    },

    /// The disk filled up; permanent, never retried
    #[error("Insufficient disk space: {message}")]
    #[diagnostic(
        code(btctest::vcs::disk_space),
        help("Free up disk space and try again")
    )]
    DiskSpace {
        /// Raw process output
        message: String,
    },

    /// The repository or branch could not be accessed; permanent, never retried
    #[error("Repository access error: {message}")]
    #[diagnostic(
        code(btctest::vcs::repository),
        help("Verify the repository URL and branch name are correct")
    )]
    Repository {
        /// Raw process output
        message: String,
    },

    /// Authentication was rejected; permanent, never retried
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(btctest::vcs::authentication),
        help("Check your credentials and repository access permissions")
    )]
    Authentication {
        /// Raw process output
        message: String,
    },

    /// Network connectivity failure after exhausting all retries
    #[error("Network error after {attempts} attempts: {message}")]
    #[diagnostic(
        code(btctest::vcs::network),
        help("Check your internet connection and try again")
    )]
    Network {
        /// Raw process output
        message: String,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Per-attempt wall-clock bound exceeded on every attempt
    #[error("Operation timed out after {attempts} attempts ({seconds}s each)")]
    #[diagnostic(
        code(btctest::vcs::timeout),
        help(
            "The repository might be large or your connection slow. \
             Try increasing the timeout."
        )
    )]
    Timeout {
        /// Per-attempt bound in seconds
        seconds: u64,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Unclassified failure after exhausting all retries
    #[error("Command failed after {attempts} attempts: {message}")]
    #[diagnostic(code(btctest::vcs::generic))]
    Generic {
        /// Raw process output
        message: String,
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl Error {
    /// Short category name, used by the CLI for exit-code mapping
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Ssl { .. } => "ssl",
            Self::DiskSpace { .. } => "disk-space",
            Self::Repository { .. } => "repository",
            Self::Authentication { .. } => "authentication",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::Generic { .. } => "generic",
        }
    }
}

/// Result type for vcs operations
pub type Result<T> = std::result::Result<T, Error>;
