//! Clone orchestration: make a target directory contain a repository
//!
//! Composes the cache, the retrying runner and the connectivity diagnostics
//! into a single `ensure_cloned` operation. Classified errors from the runner
//! propagate unchanged; cache problems degrade to a fresh clone.

use crate::cache::{RepoCache, copy_tree};
use crate::diagnostics::diagnose_connectivity;
use crate::process::{RetryPolicy, run_with_retry};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Parameters for one clone operation
#[derive(Debug, Clone)]
pub struct CloneRequest {
    /// Repository URL to clone
    pub repo_url: String,
    /// Branch to clone and check out
    pub branch: String,
    /// Directory that must end up containing the repository
    pub target_dir: PathBuf,
    /// Whether the clone cache participates
    pub use_cache: bool,
    /// Clone with `--depth`
    pub shallow: bool,
    /// Depth for shallow clones
    pub depth: u32,
    /// Retry policy for the clone itself (clones are large; use a long
    /// per-attempt timeout)
    pub policy: RetryPolicy,
}

impl CloneRequest {
    /// Request a shallow depth-1 clone with the default clone policy
    /// (3 attempts, 600s each, 10s apart).
    #[must_use]
    pub fn new(
        repo_url: impl Into<String>,
        branch: impl Into<String>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            branch: branch.into(),
            target_dir: target_dir.into(),
            use_cache: true,
            shallow: true,
            depth: 1,
            policy: RetryPolicy {
                max_retries: 3,
                timeout: std::time::Duration::from_secs(600),
                retry_delay: std::time::Duration::from_secs(10),
            },
        }
    }

    fn clone_argv(&self) -> Vec<String> {
        let mut argv = vec!["git".to_string(), "clone".to_string()];
        if self.shallow {
            argv.push("--depth".to_string());
            argv.push(self.depth.to_string());
        }
        argv.push("--branch".to_string());
        argv.push(self.branch.clone());
        argv.push(self.repo_url.clone());
        argv.push(self.target_dir.to_string_lossy().into_owned());
        argv
    }
}

/// Ensure `request.target_dir` contains the requested repository.
///
/// Resolution order: cache hit (copy + checkout), existing target directory
/// (returned as-is, no freshness check), fresh shallow clone. A successful
/// fresh clone is stored back into the cache best-effort.
pub async fn ensure_cloned(request: &CloneRequest, cache: &RepoCache) -> Result<()> {
    let target = &request.target_dir;

    if request.use_cache
        && let Some(cached) = cache.lookup(&request.repo_url, &request.branch).await
    {
        info!(
            "Found cached repository for {}@{}",
            request.repo_url, request.branch
        );
        match restore_from_cache(&cached, target, &request.branch).await {
            Ok(()) => {
                info!("Repository copied from cache to {}", target.display());
                return Ok(());
            }
            Err(err) => {
                warn!("Failed to use cached repository, falling back to fresh clone: {err}");
                // Never leave a half-copied target behind
                let _ = std::fs::remove_dir_all(target);
            }
        }
    }

    if target.exists() {
        info!(
            "Repository directory {} already exists, skipping clone",
            target.display()
        );
        return Ok(());
    }

    info!(
        "Cloning {} (branch: {}) into {}",
        request.repo_url,
        request.branch,
        target.display()
    );
    for line in diagnose_connectivity(&request.repo_url).await {
        info!("  {line}");
    }

    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|err| Error::Generic {
            message: format!("failed to create {}: {err}", parent.display()),
            attempts: 0,
        })?;
    }

    run_with_retry(
        &request.clone_argv(),
        "clone repository",
        &request.policy,
        None,
    )
    .await?;
    info!("Repository cloned successfully into {}", target.display());

    if request.use_cache {
        if cache.store(&request.repo_url, &request.branch, target) {
            info!("Repository cached for future use");
        } else {
            warn!("Failed to cache repository");
        }
    }

    Ok(())
}

/// Copy a cached tree into the target and force it onto the requested branch.
///
/// The checkout guards against cache entries whose checked-out branch differs
/// from the one recorded for them.
async fn restore_from_cache(cached: &Path, target: &Path, branch: &str) -> Result<()> {
    let copy = || -> std::io::Result<()> {
        if target.exists() {
            std::fs::remove_dir_all(target)?;
        }
        copy_tree(cached, target)
    };
    copy().map_err(|err| Error::Generic {
        message: format!("cache copy failed: {err}"),
        attempts: 0,
    })?;

    run_with_retry(
        &[
            "git".to_string(),
            "checkout".to_string(),
            branch.to_string(),
        ],
        "switch branch",
        &RetryPolicy::default(),
        Some(target),
    )
    .await?;
    Ok(())
}
