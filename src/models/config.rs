//! Configuration models for wordfold.
//!
//! Every knob the engine and reader need is an explicit field here; nothing is
//! read from the process environment except through `${VAR}` expansion.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Top-level configuration for wordfold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Record source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Batch loop configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Checkpoint storage configuration
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Downstream word filter configuration
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Record source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Location of the record store. Supports `${VAR}` expansion.
    #[serde(default = "default_source_uri")]
    pub uri: String,

    /// Table holding `id, title, text, polarity` rows
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_source_uri() -> String {
    "${DATABASE_URL}".to_string()
}

fn default_table() -> String {
    "reviews".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: default_source_uri(),
            table: default_table(),
        }
    }
}

/// Batch loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Records requested per fetch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between successful batches, bounding load on the source
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Pause before retrying a failed fetch
    #[serde(default = "default_backoff_delay_ms")]
    pub backoff_delay_ms: u64,

    /// Show a live progress spinner
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Checkpoint write attempts per batch before the run stops
    #[serde(default = "default_persist_attempts")]
    pub persist_attempts: u32,
}

fn default_batch_size() -> usize {
    1000
}

fn default_pacing_delay_ms() -> u64 {
    1000
}

fn default_backoff_delay_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_persist_attempts() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pacing_delay_ms: default_pacing_delay_ms(),
            backoff_delay_ms: default_backoff_delay_ms(),
            progress: default_true(),
            persist_attempts: default_persist_attempts(),
        }
    }
}

impl EngineConfig {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_delay_ms)
    }
}

/// Checkpoint storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding checkpoint and final result files
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("state")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: default_checkpoint_dir(),
        }
    }
}

/// Downstream word filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Words shorter than this (in characters) are dropped
    #[serde(default = "default_min_word_length")]
    pub min_word_length: usize,

    /// Fraction of the total count a word must reach to be kept
    #[serde(default = "default_freq_threshold")]
    pub freq_threshold: f64,

    /// Additional words to drop on top of the built-in list
    #[serde(default)]
    pub extra_common_words: Vec<String>,
}

fn default_min_word_length() -> usize {
    3
}

fn default_freq_threshold() -> f64 {
    0.0004
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_word_length: default_min_word_length(),
            freq_threshold: default_freq_threshold(),
            extra_common_words: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Resolve the source URI, expanding `${VAR}` placeholders.
    pub fn resolve_source_uri(&self) -> Result<String, ConfigError> {
        let uri = expand_env_vars(&self.source.uri);
        if let Some(cap) = ENV_VAR_RE.captures(&uri) {
            return Err(ConfigError::UnresolvedVariable {
                field: "source.uri".to_string(),
                var: cap[1].to_string(),
            });
        }
        if uri.trim().is_empty() {
            return Err(ConfigError::Invalid("source.uri must not be empty".to_string()));
        }
        Ok(uri)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "engine.batch_size must be at least 1".to_string(),
            ));
        }
        if self.engine.backoff_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.backoff_delay_ms must be positive".to_string(),
            ));
        }
        if self.engine.persist_attempts == 0 {
            return Err(ConfigError::Invalid(
                "engine.persist_attempts must be at least 1".to_string(),
            ));
        }
        if !is_identifier(&self.source.table) {
            return Err(ConfigError::Invalid(format!(
                "source.table '{}' is not a plain identifier",
                self.source.table
            )));
        }
        if !(0.0..1.0).contains(&self.filter.freq_threshold) {
            return Err(ConfigError::Invalid(
                "filter.freq_threshold must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

static ENV_VAR_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    for cap in ENV_VAR_RE.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unresolved variable ${{{var}}} in {field}: set the env var or edit the config")]
    UnresolvedVariable { field: String, var: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
