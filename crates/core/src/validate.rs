//! Validation of user-supplied repository URLs and branch names
//!
//! Both values end up as arguments to `git`, so anything that could be
//! interpreted by a shell or as a command-line option is rejected up front.

use crate::{Error, Result};
use tracing::warn;

const SHELL_METACHARACTERS: [char; 9] = ['<', '>', '"', '\'', ';', '|', '&', '$', '`'];

/// Validate a Git repository URL, returning it trimmed.
pub fn validate_repo_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::validation("repository URL cannot be empty"));
    }

    if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with("git@")) {
        return Err(Error::validation(
            "repository URL must start with 'http://', 'https://', or 'git@'",
        ));
    }

    if url.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
        return Err(Error::validation(
            "repository URL contains invalid characters",
        ));
    }

    if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        let host = rest.split('/').next().unwrap_or("");
        if host.is_empty() {
            return Err(Error::validation(
                "repository URL must include a valid domain",
            ));
        }
        let path = rest.strip_prefix(host).unwrap_or("").to_ascii_lowercase();
        if !path.ends_with(".git") && !path.contains("/bitcoin") {
            warn!("URL '{url}' doesn't look like a Git repository; proceeding anyway");
        }
    }

    Ok(url)
}

/// Validate a Git branch name, returning it trimmed.
pub fn validate_branch_name(branch: &str) -> Result<&str> {
    let branch = branch.trim();
    if branch.is_empty() {
        return Err(Error::validation("branch name cannot be empty"));
    }
    if branch.len() > 255 {
        return Err(Error::validation(
            "branch name is too long (maximum 255 characters)",
        ));
    }
    if branch
        .chars()
        .any(|c| SHELL_METACHARACTERS.contains(&c) || c.is_control())
    {
        return Err(Error::validation("branch name contains invalid characters"));
    }
    if branch.contains("..") || branch.starts_with('/') {
        return Err(Error::validation(
            "branch name contains invalid path components",
        ));
    }
    // Would be parsed as an option by git
    if branch.starts_with('-') {
        return Err(Error::validation("branch name cannot start with a dash"));
    }
    if !branch
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
    {
        return Err(Error::validation(
            "branch name may only contain alphanumerics, dots, underscores, hyphens and slashes",
        ));
    }

    Ok(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_repository_urls() {
        for url in [
            "https://github.com/bitcoin/bitcoin",
            "https://example.com/fork/repo.git",
            "http://mirror.internal/bitcoin.git",
            "git@github.com:bitcoin/bitcoin.git",
        ] {
            assert!(validate_repo_url(url).is_ok(), "{url}");
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(
            validate_repo_url("  https://example.com/r.git  ").unwrap(),
            "https://example.com/r.git"
        );
        assert_eq!(validate_branch_name(" main ").unwrap(), "main");
    }

    #[test]
    fn rejects_bad_repository_urls() {
        for url in [
            "",
            "   ",
            "ftp://example.com/repo.git",
            "https://example.com/repo.git; rm -rf /",
            "https://example.com/$(whoami)/repo.git",
            "https:///no-host.git",
        ] {
            assert!(validate_repo_url(url).is_err(), "{url}");
        }
    }

    #[test]
    fn accepts_common_branch_names() {
        for branch in ["master", "main", "v27.x", "feature/retry-logic", "release_1.2"] {
            assert!(validate_branch_name(branch).is_ok(), "{branch}");
        }
    }

    #[test]
    fn rejects_bad_branch_names() {
        let long = "a".repeat(256);
        for branch in [
            "",
            "  ",
            "../escape",
            "/absolute",
            "-rf",
            "name;injection",
            "name with spaces",
            "tab\tname",
            long.as_str(),
        ] {
            assert!(validate_branch_name(branch).is_err(), "{branch}");
        }
    }
}
