//! Working-tree cache for cloned repositories
//!
//! Entries are keyed by a hash of `url@branch` and stored as full directory
//! copies under the cache root, next to a single `cache_metadata.json` index.
//! The cache is best-effort throughout: a failed store or eviction never fails
//! the clone that triggered it.
//!
//! A [`RepoCache`] is constructed by the caller and passed by reference; the
//! metadata map is guarded by one narrowly-scoped mutex. Concurrent use from
//! multiple processes is NOT supported (there is no file locking); the tool
//! runs one workflow per invocation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Name of the metadata index file inside the cache root
pub const METADATA_FILE: &str = "cache_metadata.json";

/// Fraction of the size cap eviction shrinks the cache down to
const EVICTION_HEADROOM: f64 = 0.8;

/// Bound on the branch-ref verification subprocess
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Metadata recorded for one cached repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Repository URL the entry was cloned from
    pub repo_url: String,
    /// Branch the entry holds
    pub branch: String,
    /// Unix timestamp of when the entry was stored
    pub cached_at: i64,
}

type Metadata = BTreeMap<String, CacheEntry>;

/// Hash-keyed store of cloned working trees
#[derive(Debug)]
pub struct RepoCache {
    root: PathBuf,
    max_size_bytes: u64,
    metadata: Mutex<Metadata>,
}

/// Compute the cache key for a repository/branch pair.
///
/// Stable across processes: the first 16 hex characters of
/// `SHA256("{url}@{branch}")`.
#[must_use]
pub fn repo_key(repo_url: &str, branch: &str) -> String {
    let digest = Sha256::digest(format!("{repo_url}@{branch}").as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Resolve the default cache root (first writable candidate wins):
/// `BTCTEST_CACHE_DIR`, the OS cache dir, `~/.cache/btctest/repos`, then a
/// temp-directory fallback.
#[must_use]
pub fn default_root() -> PathBuf {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = std::env::var_os("BTCTEST_CACHE_DIR").filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(dir));
    }
    if let Some(cache) = dirs::cache_dir() {
        candidates.push(cache.join("btctest/repos"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".cache/btctest/repos"));
    }
    candidates.push(std::env::temp_dir().join("btctest/repos"));
    first_writable(candidates)
}

fn first_writable(candidates: Vec<PathBuf>) -> PathBuf {
    for path in &candidates {
        if std::fs::create_dir_all(path).is_ok() {
            return path.clone();
        }
    }
    // The temp fallback is always last; hand it back even if creation failed
    // so the caller surfaces the real I/O error on first use.
    candidates
        .into_iter()
        .next_back()
        .unwrap_or_else(std::env::temp_dir)
}

impl RepoCache {
    /// Open (creating if needed) a cache rooted at `root` with a size cap in
    /// gigabytes.
    pub fn open(root: impl Into<PathBuf>, max_cache_size_gb: f64) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let max_size_bytes = (max_cache_size_gb.max(0.0) * 1024.0 * 1024.0 * 1024.0) as u64;
        let metadata = load_metadata(&root.join(METADATA_FILE));
        Ok(Self {
            root,
            max_size_bytes,
            metadata: Mutex::new(metadata),
        })
    }

    /// The cache root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    fn lock_metadata(&self) -> std::sync::MutexGuard<'_, Metadata> {
        self.metadata.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a cached working tree for `(repo_url, branch)`.
    ///
    /// The entry is verified before being handed out: the directory must
    /// exist, contain a `.git` marker, and the branch ref must resolve inside
    /// it. A failed verification removes the entry from the persisted
    /// metadata (self-healing) and reports a miss.
    pub async fn lookup(&self, repo_url: &str, branch: &str) -> Option<PathBuf> {
        let key = repo_key(repo_url, branch);
        if !self.lock_metadata().contains_key(&key) {
            return None;
        }

        let path = self.entry_path(&key);
        let valid = path.is_dir()
            && path.join(".git").exists()
            && branch_ref_exists(&path, branch).await;

        if valid {
            debug!("Cache hit for {repo_url}@{branch} ({key})");
            Some(path)
        } else {
            debug!("Cache entry {key} failed validation, removing");
            self.remove_entry(&key);
            None
        }
    }

    /// Store a working tree copy for `(repo_url, branch)`.
    ///
    /// Runs eviction first, replaces any existing entry, and skips transient
    /// files (`*.tmp`, `*.lock`). Returns `false` on any I/O failure instead
    /// of propagating; caching must never fail the clone it follows.
    pub fn store(&self, repo_url: &str, branch: &str, source: &Path) -> bool {
        self.evict();

        let key = repo_key(repo_url, branch);
        let dest = self.entry_path(&key);

        if dest.exists()
            && let Err(err) = std::fs::remove_dir_all(&dest)
        {
            warn!("Failed to replace cache entry {key}: {err}");
            return false;
        }
        if let Err(err) = copy_tree(source, &dest) {
            warn!("Failed to cache repository {repo_url}@{branch}: {err}");
            // Drop the partial copy so a later lookup cannot see it
            let _ = std::fs::remove_dir_all(&dest);
            return false;
        }

        let persisted = {
            let mut metadata = self.lock_metadata();
            metadata.insert(
                key.clone(),
                CacheEntry {
                    repo_url: repo_url.to_string(),
                    branch: branch.to_string(),
                    cached_at: Utc::now().timestamp(),
                },
            );
            persist_metadata(&self.metadata_path(), &metadata)
        };
        if !persisted {
            return false;
        }

        info!("Cached repository {repo_url}@{branch} as {key}");
        true
    }

    /// Evict oldest entries until total size is within the configured cap.
    ///
    /// Runs only when the cap is exceeded, and then shrinks the cache to 80%
    /// of the cap, removing entries oldest-first (ties broken by key).
    /// Deletion failures are logged and skipped.
    pub fn evict(&self) {
        let entries: Vec<(String, i64)> = self
            .lock_metadata()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.cached_at))
            .collect();

        let mut sized: Vec<(String, i64, u64)> = entries
            .into_iter()
            .map(|(key, cached_at)| {
                let size = dir_size(&self.entry_path(&key));
                (key, cached_at, size)
            })
            .collect();
        let mut total: u64 = sized.iter().map(|(_, _, size)| size).sum();
        if total <= self.max_size_bytes {
            return;
        }

        let target = (self.max_size_bytes as f64 * EVICTION_HEADROOM) as u64;
        sized.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));

        let mut removed = Vec::new();
        for (key, _, size) in sized {
            if total <= target {
                break;
            }
            match std::fs::remove_dir_all(self.entry_path(&key)) {
                Ok(()) => {
                    info!("Evicted cache entry {key} ({size} bytes)");
                    total = total.saturating_sub(size);
                    removed.push(key);
                }
                Err(err) => warn!("Failed to evict cache entry {key}: {err}"),
            }
        }

        if !removed.is_empty() {
            let mut metadata = self.lock_metadata();
            for key in removed {
                metadata.remove(&key);
            }
            persist_metadata(&self.metadata_path(), &metadata);
        }
    }

    /// Remove every entry and reset the metadata index.
    pub fn clear(&self) {
        let mut metadata = self.lock_metadata();
        if let Ok(entries) = std::fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                if entry.path().is_dir()
                    && let Err(err) = std::fs::remove_dir_all(entry.path())
                {
                    warn!("Failed to remove {}: {err}", entry.path().display());
                }
            }
        }
        metadata.clear();
        persist_metadata(&self.metadata_path(), &metadata);
        info!("Repository cache cleared");
    }

    fn remove_entry(&self, key: &str) {
        let mut metadata = self.lock_metadata();
        if metadata.remove(key).is_some() {
            persist_metadata(&self.metadata_path(), &metadata);
        }
    }
}

fn load_metadata(path: &Path) -> Metadata {
    if !path.exists() {
        return Metadata::new();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
            warn!("Corrupted cache metadata, starting empty: {err}");
            Metadata::new()
        }),
        Err(err) => {
            warn!("Failed to read cache metadata: {err}");
            Metadata::new()
        }
    }
}

fn persist_metadata(path: &Path, metadata: &Metadata) -> bool {
    match serde_json::to_vec_pretty(metadata) {
        Ok(json) => {
            if let Err(err) = std::fs::write(path, json) {
                warn!("Failed to save cache metadata: {err}");
                return false;
            }
            true
        }
        Err(err) => {
            warn!("Failed to serialize cache metadata: {err}");
            false
        }
    }
}

/// Check whether `refs/heads/<branch>` resolves inside `dir`, bounded so a
/// wedged git cannot stall a lookup.
async fn branch_ref_exists(dir: &Path, branch: &str) -> bool {
    let refspec = format!("refs/heads/{branch}");
    let mut command = tokio::process::Command::new("git");
    command
        .args(["show-ref", "--verify", "--quiet", refspec.as_str()])
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(VERIFY_TIMEOUT, command.status()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(err)) => {
            warn!("Branch verification could not run git: {err}");
            false
        }
        Err(_elapsed) => {
            warn!("Branch verification timed out in {}", dir.display());
            false
        }
    }
}

fn is_transient(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.ends_with(".tmp") || name.ends_with(".lock")
}

pub(crate) fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if is_transient(entry.file_name()) {
                continue;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
