//! Shared foundation for the btctest runner
//!
//! This crate carries the pieces every other btctest crate relies on:
//! the common error type, the layered configuration system, validation of
//! user-supplied repository coordinates, and the background resource monitor.

pub mod config;
pub mod error;
pub mod monitor;
pub mod validate;

pub use config::{CliOverrides, Config};
pub use error::{Error, Result};
