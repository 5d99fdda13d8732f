//! csvlake Common Library
//!
//! Shared error handling and logging for the csvlake workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`LakeError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by `LOG_*` environment variables
//!
//! # Example
//!
//! ```no_run
//! use csvlake_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> csvlake_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("csvlake started");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{LakeError, Result};
