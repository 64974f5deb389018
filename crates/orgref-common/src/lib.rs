//! Orgref Common Library
//!
//! Shared error handling and logging setup for the orgref workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all orgref workspace members:
//!
//! - **Error Handling**: the [`OrgRefError`] type and [`Result`] alias
//! - **Logging**: `tracing`-based logging configuration and initialization
//!
//! # Example
//!
//! ```no_run
//! use orgref_common::logging::{init_logging, LogConfig, LogLevel};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::builder().level(LogLevel::Debug).build();
//!     init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{OrgRefError, Result};
