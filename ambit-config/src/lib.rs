//! Configuration for the Ambit pipeline.
//!
//! All tuning lives in explicit structs constructed once at process start and
//! passed by reference into each component; no module reads ambient global
//! state. `ConfigLoader` layers an optional `ambit.toml` under
//! `AMBIT__`-prefixed environment variables.

pub mod loader;
pub mod models;

pub use loader::{ConfigError, ConfigLoader};
pub use models::{
    BatchConfig, BatchOverrides, BusConfig, NodeDefaults, PipelineConfig, ScopeConfig,
};
