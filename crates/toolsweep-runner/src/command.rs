//! Command construction.
//!
//! Commands are argv vectors. Nothing is passed through a shell, so a record
//! containing shell metacharacters reaches the tool verbatim.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Placeholder replaced by the record identifier in template arguments.
pub const RECORD_PLACEHOLDER: &str = "{record}";

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Build a `std::process::Command` (stdio not yet configured).
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }
        command
    }

    /// Shell-like rendering for logs only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Program plus argument template, rendered once per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Whether any argument references the record.
    pub fn has_placeholder(&self) -> bool {
        self.args.iter().any(|a| a.contains(RECORD_PLACEHOLDER))
    }

    /// Substitute `record` into every placeholder.
    pub fn render(&self, record: &str, working_dir: &Path) -> CommandSpec {
        CommandSpec::new(self.program.clone())
            .args(self.args.iter().map(|a| a.replace(RECORD_PLACEHOLDER, record)))
            .cwd(working_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> CommandTemplate {
        CommandTemplate::new(
            "java",
            vec![
                "-jar".to_string(),
                "tool.jar".to_string(),
                "tac".to_string(),
                "--address".to_string(),
                RECORD_PLACEHOLDER.to_string(),
            ],
        )
    }

    #[test]
    fn test_render_substitutes_record() {
        let spec = template().render("EQAbc:123", Path::new("/work"));
        assert_eq!(spec.program, "java");
        assert_eq!(spec.args, vec!["-jar", "tool.jar", "tac", "--address", "EQAbc:123"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_render_inside_larger_argument() {
        let t = CommandTemplate::new("tool", vec!["--out=out/{record}.txt".to_string()]);
        let spec = t.render("a1", Path::new("."));
        assert_eq!(spec.args, vec!["--out=out/a1.txt"]);
    }

    #[test]
    fn test_record_with_shell_metacharacters_is_literal() {
        let spec = template().render("x; rm -rf /", Path::new("."));
        assert_eq!(spec.args.last().map(String::as_str), Some("x; rm -rf /"));
    }

    #[test]
    fn test_has_placeholder() {
        assert!(template().has_placeholder());
        assert!(!CommandTemplate::new("true", vec![]).has_placeholder());
    }

    #[test]
    fn test_display() {
        let spec = CommandSpec::new("echo").arg("hello").arg("world");
        assert_eq!(spec.display(), "echo hello world");
    }
}
