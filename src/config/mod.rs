//! Configuration module for tablescribe.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, ConnectionSettings, LlmSettings, PipelineSettings,
    ProfilingSettings, RetrySettings, Settings, SettingsError, TokenCounterKind, WorkerSettings,
};
