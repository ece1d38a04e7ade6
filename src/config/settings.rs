//! TOML-based configuration for tablescribe.
//!
//! Supports a config file (tablescribe.toml) with environment variable
//! expansion in connection strings.
//!
//! Example configuration:
//! ```toml
//! [connections.warehouse]
//! driver = "bigquery"
//! connection_string = "bigquery://${GCP_PROJECT}"
//!
//! [connections.local]
//! driver = "duckdb"
//! connection_string = "./data/dev.duckdb"
//!
//! [worker]
//! path = "./tablescribe-worker"
//! timeout_seconds = 120
//!
//! [sampling]
//! sample_size = 1000
//! max_partitions = 3
//! max_cost = 0.5
//!
//! [profiling]
//! categorical_threshold = 20
//! force_categorical = ["zip_code"]
//!
//! [llm]
//! model = "gpt-4o-mini"
//! token_threshold = 6000
//!
//! [llm.retry]
//! max_attempts = 3
//! backoff = { kind = "exponential", multiplier = 2.0 }
//!
//! [pipeline]
//! max_workers = 8
//! run_timeout_seconds = 1800
//!
//! [inclusion]
//! query_examples = false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::document::InclusionConfig;
use crate::llm::{Backoff, Jitter, LlmConfig, RetryPolicy};
use crate::profiling::{CategoricalRule, ProfilingConfig};
use crate::sampling::{SamplingBudget, SqlDialect};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Unsupported SQL dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    /// Worker sidecar configuration.
    pub worker: WorkerSettings,

    /// Sampling budget defaults.
    pub sampling: SamplingBudget,

    pub profiling: ProfilingSettings,

    pub llm: LlmSettings,

    pub pipeline: PipelineSettings,

    pub cache: CacheSettings,

    /// Default optional sections.
    pub inclusion: InclusionConfig,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Database driver understood by the worker (bigquery, postgres, duckdb, ...).
    pub driver: String,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,

    /// SQL dialect for sample queries; defaults to the driver's dialect.
    #[serde(default)]
    pub dialect: Option<String>,

    /// Database used for unqualified table names.
    #[serde(default)]
    pub default_database: Option<String>,

    /// Schema used for unqualified table names.
    #[serde(default)]
    pub default_schema: Option<String>,
}

impl ConnectionSettings {
    /// Resolve the SQL dialect from `dialect`, else from `driver`, else ANSI.
    pub fn sql_dialect(&self) -> Result<SqlDialect, SettingsError> {
        match &self.dialect {
            Some(name) => SqlDialect::from_name(name)
                .ok_or_else(|| SettingsError::UnsupportedDialect(name.clone())),
            None => Ok(SqlDialect::from_name(&self.driver).unwrap_or_default()),
        }
    }

    /// Get the connection string with environment variables expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to the worker binary.
    pub path: Option<String>,

    /// Extra command-line arguments for the worker.
    pub args: Vec<String>,

    /// Per-request timeout.
    pub timeout_seconds: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            timeout_seconds: 120,
        }
    }
}

/// Profiling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilingSettings {
    /// Sample queries in flight per table.
    pub max_concurrent_samples: usize,

    /// Maximum distinct values of a categorical column.
    pub categorical_threshold: u64,

    /// Maximum distinct / non-null ratio of a categorical column.
    pub categorical_max_ratio: f64,

    /// Columns always treated as categorical.
    pub force_categorical: Vec<String>,

    /// Columns never treated as categorical.
    pub force_non_categorical: Vec<String>,

    /// Categorical values kept per column; the rest fold into "other".
    pub max_categorical_values: usize,

    /// Example values kept per non-categorical column.
    pub sample_values: usize,
}

impl Default for ProfilingSettings {
    fn default() -> Self {
        let config = ProfilingConfig::default();
        Self {
            max_concurrent_samples: config.max_concurrent_samples,
            categorical_threshold: config.categorical.threshold,
            categorical_max_ratio: config.categorical.max_ratio,
            force_categorical: Vec::new(),
            force_non_categorical: Vec::new(),
            max_categorical_values: config.max_categorical_values,
            sample_values: config.sample_values,
        }
    }
}

impl ProfilingSettings {
    pub fn to_config(&self) -> ProfilingConfig {
        ProfilingConfig {
            max_concurrent_samples: self.max_concurrent_samples,
            categorical: CategoricalRule {
                threshold: self.categorical_threshold,
                max_ratio: self.categorical_max_ratio,
                force_categorical: self.force_categorical.clone(),
                force_non_categorical: self.force_non_categorical.clone(),
            },
            max_categorical_values: self.max_categorical_values,
            sample_values: self.sample_values,
        }
    }
}

/// How prompt tokens are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenCounterKind {
    /// Ask the worker for the model's tokenizer count.
    #[default]
    Worker,
    /// Estimate from character length.
    Heuristic,
}

/// LLM configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider model identifier forwarded to the worker.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Chunks in flight per table.
    pub max_in_flight: usize,
    /// Token ceiling per prompt.
    pub token_threshold: usize,
    pub token_counter: TokenCounterKind,
    pub retry: RetrySettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let config = LlmConfig::default();
        Self {
            model: config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_in_flight: config.max_in_flight,
            token_threshold: config.token_threshold,
            token_counter: TokenCounterKind::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl LlmSettings {
    pub fn to_config(&self) -> LlmConfig {
        LlmConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            max_in_flight: self.max_in_flight,
            token_threshold: self.token_threshold,
            retry: self.retry.to_policy(),
        }
    }
}

/// Retry configuration for LLM calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: Backoff,
    pub jitter: Jitter,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            backoff: policy.backoff,
            jitter: policy.jitter,
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff: self.backoff,
            jitter: self.jitter,
        }
    }
}

/// Pipeline-wide concurrency and deadlines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Sample fetches and LLM calls in flight across every table of a run.
    pub max_workers: usize,

    /// Tables processed concurrently in a batch.
    pub max_concurrent_tables: usize,

    /// Deadline for one table's run (`None` = no deadline).
    pub run_timeout_seconds: Option<u64>,

    /// Fall back to schema-only profiling when no sample can be fetched.
    pub allow_schema_only: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_workers: 8,
            max_concurrent_tables: 2,
            run_timeout_seconds: Some(1800),
            allow_schema_only: false,
        }
    }
}

/// Document cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Cache database path; defaults to `~/.tablescribe/cache.db`.
    pub path: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TABLESCRIBE_CONFIG`
    /// 2. `./tablescribe.toml`
    /// 3. `<config dir>/tablescribe/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("TABLESCRIBE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("tablescribe.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tablescribe").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Reject values no run could work with.
    fn check(&self) -> Result<(), SettingsError> {
        if self.pipeline.max_workers == 0 {
            return Err(SettingsError::InvalidConfig(
                "pipeline.max_workers must be at least 1".to_string(),
            ));
        }
        if self.sampling.sample_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "sampling.sample_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.profiling.categorical_max_ratio) {
            return Err(SettingsError::InvalidConfig(
                "profiling.categorical_max_ratio must be between 0 and 1".to_string(),
            ));
        }
        for (name, conn) in &self.connections {
            if let Some(dialect) = &conn.dialect {
                if SqlDialect::from_name(dialect).is_none() {
                    return Err(SettingsError::InvalidConfig(format!(
                        "connections.{}.dialect: unsupported dialect '{}'",
                        name, dialect
                    )));
                }
            }
        }
        Ok(())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get the default connection ("default" if it exists, else the first by name).
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        if let Some(conn) = self.connections.get("default") {
            return Some(("default", conn));
        }
        self.connections
            .iter()
            .min_by_key(|(k, _)| k.as_str())
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Get the worker binary path.
    ///
    /// Returns the configured path, or searches common locations and `PATH`.
    pub fn worker_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.worker.path {
            let expanded = expand_env_vars(path).ok()?;
            return Some(PathBuf::from(expanded));
        }

        let candidates = ["./tablescribe-worker", "./worker/tablescribe-worker"];
        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(output) = std::process::Command::new("which")
            .arg("tablescribe-worker")
            .output()
        {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(PathBuf::from(path));
                }
            }
        }

        None
    }

    /// Cache database path from `[cache]`, if set.
    pub fn cache_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.cache
            .path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name = if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                // lone $
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
