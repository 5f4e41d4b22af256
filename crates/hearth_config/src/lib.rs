//! Parsing and validation of `hearth.toml` build configuration files.
//!
//! This crate reads the build configuration and produces a strongly-typed
//! [`BuildConfig`]: target-wide settings plus one declarative rule set per
//! module. [`resolve`] holds the merge function used to derive module-level
//! flags from target defaults.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_flag, resolve_override, FlagMerge};
pub use types::*;
