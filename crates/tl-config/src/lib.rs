//! txlat configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the trace configuration file
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - JSON Schema export for the configuration file

pub mod resolve;
pub mod trace;
pub mod validate;

pub use resolve::{resolve_config, resolve_config_with_env, ConfigOverrides, ConfigSource, ResolvedConfig};
pub use trace::{NegativeDeltaPolicy, ProbeSpec, ResultRange, TraceConfig, MAX_RESULT_BINS};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
