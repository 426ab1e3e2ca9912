//! Substring classification of git failure output
//!
//! Git reports everything on stderr as free text, so failures are bucketed by
//! keyword. Matching is case-insensitive and the order below is significant:
//! a message like "remote: access denied or repository not found" must land in
//! the repository bucket even though it also matches authentication keywords.

/// Failure category derived from process output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// SSL/TLS certificate problem
    Ssl,
    /// Out of disk space
    DiskSpace,
    /// Repository missing or inaccessible
    Repository,
    /// Credentials rejected
    Authentication,
    /// Transient network connectivity problem
    Network,
    /// Anything else
    Generic,
}

const SSL_INDICATORS: &[&str] = &[
    "ssl certificate",
    "ssl verification",
    "tls",
    "certificate verify failed",
    "self signed certificate",
    "certificate has expired",
    "unable to verify the first certificate",
];

const DISK_SPACE_INDICATORS: &[&str] = &[
    "no space left on device",
    "disk full",
    "insufficient disk space",
    "out of disk space",
    "disk quota exceeded",
];

const REPOSITORY_INDICATORS: &[&str] = &[
    "repository not found",
    "does not exist",
    "remote: repository not found",
    "remote: access denied",
    "remote: permission to",
    "remote: the repository you are trying to access does not exist",
    "fatal: remote error:",
    "fatal: could not read from remote repository",
];

const AUTHENTICATION_INDICATORS: &[&str] = &[
    "authentication failed",
    "permission denied",
    "access denied",
    "not authorized",
    "invalid credentials",
    "remote: invalid username or password",
];

const NETWORK_INDICATORS: &[&str] = &[
    "network is unreachable",
    "connection refused",
    "connection timed out",
    "connection reset",
    "no route to host",
    "temporary failure in name resolution",
    "could not resolve host",
    "failed to connect",
    "network error",
    "transfer closed with",
    "the remote end hung up unexpectedly",
];

fn matches_any(text: &str, indicators: &[&str]) -> bool {
    indicators.iter().any(|needle| text.contains(needle))
}

/// Classify process output into an [`ErrorKind`].
///
/// Pure function; empty or whitespace-only input is [`ErrorKind::Generic`].
#[must_use]
pub fn classify(text: &str) -> ErrorKind {
    let text = text.to_lowercase();
    if matches_any(&text, SSL_INDICATORS) {
        ErrorKind::Ssl
    } else if matches_any(&text, DISK_SPACE_INDICATORS) {
        ErrorKind::DiskSpace
    } else if matches_any(&text, REPOSITORY_INDICATORS) {
        ErrorKind::Repository
    } else if matches_any(&text, AUTHENTICATION_INDICATORS) {
        ErrorKind::Authentication
    } else if matches_any(&text, NETWORK_INDICATORS) {
        ErrorKind::Network
    } else {
        ErrorKind::Generic
    }
}
