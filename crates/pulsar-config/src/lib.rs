//! Configuration for the point cloud streaming core.
//!
//! Runtime-tunable settings that persist to disk as RON files, with
//! forward/backward compatible serialization (unknown fields fall back to
//! defaults).

mod config;
mod error;

pub use config::{BudgetConfig, Config, DisplayConfig, LoadingConfig};
pub use error::ConfigError;
