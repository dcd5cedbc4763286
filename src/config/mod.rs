//! Layered configuration
//!
//! Precedence, lowest first:
//! 1. Built-in defaults
//! 2. TOML config file (`--config`, or `toolsweep.toml` if present)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{
    BuiltinDefaults, ToolConfig, DEFAULT_CONFIG_FILE, DEFAULT_INPUT, DEFAULT_LOG_PATH,
};
pub use effective::{
    ConfigError, ConfigOrigin, ConfigOverrides, ConfigSource, EffectiveConfig, HarnessConfig,
};
pub use merge::{deep_merge, merge_layers};
