//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use crate::timeout::TimeoutConfig;

/// Config file picked up from the current directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "toolsweep.toml";

/// Default record list
pub const DEFAULT_INPUT: &str = "contracts.txt";

/// Default failure log
pub const DEFAULT_LOG_PATH: &str = "errors_details.log";

/// Default tool: the TVM disassembler CLI, one address per run
pub const DEFAULT_PROGRAM: &str = "java";

pub const DEFAULT_ARGS: &[&str] = &[
    "-jar",
    "tvm-disasm-cli/build/libs/tvm-disasm-cli.jar",
    "tac",
    "--address",
    "{record}",
];

/// Tool section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    pub program: String,
    /// Argument template; `{record}` is replaced per invocation
    pub args: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    pub input: String,
    pub log_path: String,
    pub working_dir: String,
    pub timeout_ms: u64,
    pub reap_timeout_ms: u64,
    pub tool: ToolConfig,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            input: DEFAULT_INPUT.to_string(),
            log_path: DEFAULT_LOG_PATH.to_string(),
            working_dir: ".".to_string(),
            timeout_ms: timeouts.timeout_ms,
            reap_timeout_ms: timeouts.reap_timeout_ms,
            tool: ToolConfig::default(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "input": self.input,
            "log_path": self.log_path,
            "working_dir": self.working_dir,
            "timeout_ms": self.timeout_ms,
            "reap_timeout_ms": self.reap_timeout_ms,
            "tool": {
                "program": self.tool.program,
                "args": self.tool.args,
            },
        })
    }
}
