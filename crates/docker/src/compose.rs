//! Detection of the compose command flavor
//!
//! Newer Docker installations ship compose as a plugin (`docker compose`),
//! older ones as a standalone `docker-compose` binary. Detection probes both,
//! in that order, and remembers the winning argv prefix.

use crate::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The argv prefix used to invoke compose
#[derive(Debug, Clone)]
pub struct ComposeCommand {
    prefix: Vec<String>,
}

impl ComposeCommand {
    /// Probe the system for a working compose invocation.
    pub async fn detect() -> Result<Self> {
        for candidate in [&["docker", "compose"][..], &["docker-compose"][..]] {
            if probe(candidate).await {
                debug!("Using compose command: {}", candidate.join(" "));
                return Ok(Self {
                    prefix: candidate.iter().map(ToString::to_string).collect(),
                });
            }
        }
        Err(Error::ComposeUnavailable)
    }

    /// Build a `ComposeCommand` from a known prefix (used by tests)
    #[must_use]
    pub fn from_prefix(prefix: Vec<String>) -> Self {
        Self { prefix }
    }

    /// The argv prefix, e.g. `["docker", "compose"]`
    #[must_use]
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    /// Start an argv for a subcommand against the given compose file:
    /// `<prefix> -f <file>`
    #[must_use]
    pub fn argv_for_file(&self, compose_file: &str) -> Vec<String> {
        let mut argv = self.prefix.clone();
        argv.push("-f".to_string());
        argv.push(compose_file.to_string());
        argv
    }
}

async fn probe(candidate: &[&str]) -> bool {
    let mut command = tokio::process::Command::new(candidate[0]);
    command
        .args(&candidate[1..])
        .arg("version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    matches!(timeout(PROBE_TIMEOUT, command.status()).await, Ok(Ok(status)) if status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_for_file_appends_file_flag() {
        let compose = ComposeCommand::from_prefix(vec![
            "docker".to_string(),
            "compose".to_string(),
        ]);
        assert_eq!(
            compose.argv_for_file("docker-compose.yml"),
            ["docker", "compose", "-f", "docker-compose.yml"]
        );
    }

    #[test]
    fn standalone_prefix_is_preserved() {
        let compose = ComposeCommand::from_prefix(vec!["docker-compose".to_string()]);
        assert_eq!(
            compose.argv_for_file("custom.yml"),
            ["docker-compose", "-f", "custom.yml"]
        );
    }
}
