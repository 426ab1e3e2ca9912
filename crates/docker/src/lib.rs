//! Docker integration for btctest
//!
//! Wraps the compose CLI rather than the Docker API: the build and test
//! output belongs on the user's terminal, and the compose file is the
//! interface contract with the test container.

pub mod compose;
pub mod error;
pub mod ops;

pub use compose::ComposeCommand;
pub use error::{Error, Result};
