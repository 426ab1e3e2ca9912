//! Error types for Docker operations

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for compose detection and container operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Neither `docker compose` nor `docker-compose` responded
    #[error("Neither 'docker compose' nor 'docker-compose' is available")]
    #[diagnostic(
        code(btctest::docker::compose_unavailable),
        help("Ensure Docker and Docker Compose are installed and in PATH")
    )]
    ComposeUnavailable,

    /// A required file is missing from the project directory
    #[error("Missing required file: {}", path.display())]
    #[diagnostic(
        code(btctest::docker::missing_file),
        help("Run btctest from the directory containing the compose file and Dockerfile")
    )]
    MissingFile {
        /// The file that was not found
        path: PathBuf,
    },

    /// A docker invocation exited non-zero
    #[error("Docker {operation} failed with exit code {status}")]
    #[diagnostic(code(btctest::docker::command_failed))]
    CommandFailed {
        /// What was being done (e.g. "build", "cleanup")
        operation: String,
        /// Exit code reported by docker
        status: i32,
    },

    /// A docker invocation exceeded its wall-clock bound
    #[error("Docker {operation} timed out after {seconds}s")]
    #[diagnostic(
        code(btctest::docker::timeout),
        help("Increase the relevant timeout or check the Docker daemon")
    )]
    Timeout {
        /// What was being done
        operation: String,
        /// The bound that was exceeded
        seconds: u64,
    },

    /// Docker could not be spawned at all
    #[error("Failed to run docker {operation}")]
    #[diagnostic(
        code(btctest::docker::io),
        help("Ensure Docker is installed and the daemon is running")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// What was being done
        operation: String,
    },
}

/// Result type for Docker operations
pub type Result<T> = std::result::Result<T, Error>;
