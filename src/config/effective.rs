//! Effective configuration with provenance
//!
//! Built from built-in defaults, an optional TOML file and CLI flags, in that
//! order of precedence, then validated as a whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use toolsweep_runner::{CommandTemplate, RECORD_PLACEHOLDER};

use super::defaults::{BuiltinDefaults, ToolConfig};
use super::merge::merge_layers;
use crate::timeout::{TimeoutConfig, TimeoutValidationError};

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Values given on the command line; `None` leaves lower layers in charge.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub reap_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    fn is_empty(&self) -> bool {
        self.input.is_none()
            && self.log_path.is_none()
            && self.working_dir.is_none()
            && self.timeout_ms.is_none()
            && self.reap_timeout_ms.is_none()
    }

    fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        let paths = [
            ("input", &self.input),
            ("log_path", &self.log_path),
            ("working_dir", &self.working_dir),
        ];
        for (key, path) in paths {
            if let Some(p) = path {
                map.insert(key.to_string(), Value::String(p.to_string_lossy().into_owned()));
            }
        }
        if let Some(ms) = self.timeout_ms {
            map.insert("timeout_ms".to_string(), ms.into());
        }
        if let Some(ms) = self.reap_timeout_ms {
            map.insert("reap_timeout_ms".to_string(), ms.into());
        }
        Value::Object(map)
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Record list, one per line
    pub input: PathBuf,
    /// Failure log, truncated at startup
    pub log_path: PathBuf,
    /// Directory the tool runs in
    pub working_dir: PathBuf,
    pub timeout_ms: u64,
    pub reap_timeout_ms: u64,
    pub tool: ToolConfig,
}

impl HarnessConfig {
    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig {
            timeout_ms: self.timeout_ms,
            reap_timeout_ms: self.reap_timeout_ms,
        }
    }

    pub fn template(&self) -> CommandTemplate {
        CommandTemplate::new(self.tool.program.clone(), self.tool.args.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts().validate()?;

        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tool.program must not be empty".to_string(),
            ));
        }
        if !self.template().has_placeholder() {
            return Err(ConfigError::ValidationError(format!(
                "tool.args must contain {}",
                RECORD_PLACEHOLDER
            )));
        }
        Ok(())
    }
}

/// Effective configuration with the layers that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub config: HarnessConfig,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build from layers. `file`, when given, must exist.
    pub fn build(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
        }];

        if let Some(path) = file {
            layers.push(Self::load_toml_file(path)?);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_path_buf()),
            });
        }

        if !overrides.is_empty() {
            layers.push(overrides.to_value());
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
            });
        }

        let config: HarnessConfig = serde_json::from_value(merge_layers(layers))
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;

        tracing::debug!(?sources, "configuration resolved");
        Ok(Self { config, sources })
    }

    /// Parse TOML text as a standalone layer
    pub fn parse_toml(contents: &str) -> Result<Value, ConfigError> {
        let toml_value: toml::Value = toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;
        Ok(Self::toml_to_json(toml_value))
    }

    fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_toml(&contents)
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    Timeout(#[from] TimeoutValidationError),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
