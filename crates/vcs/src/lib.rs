//! Repository acquisition for btctest
//!
//! Everything needed to make "a directory containing Bitcoin Core at a given
//! branch" reliable over an unreliable network:
//!
//! - [`classify`]: maps raw git output to a failure category
//! - [`process`]: bounded subprocess execution with category-aware retries
//! - [`cache`]: a hash-keyed store of cloned working trees with size-based
//!   eviction
//! - [`clone`]: the `ensure_cloned` orchestration tying the above together
//! - [`diagnostics`]: informational connectivity probes
//!
//! The cache is not safe for concurrent use from multiple processes; the
//! runner executes a single workflow per invocation.

pub mod cache;
pub mod classify;
pub mod clone;
pub mod diagnostics;
pub mod error;
pub mod process;

pub use cache::RepoCache;
pub use clone::{CloneRequest, ensure_cloned};
pub use error::{Error, Result};
pub use process::{ProcessOutput, RetryPolicy, run_with_retry};
