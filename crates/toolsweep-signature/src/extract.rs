//! Error line extraction.
//!
//! Output is scanned from the last line to the first, since the deepest
//! diagnostic of a stack-trace style failure sits near the end.

use std::sync::OnceLock;

use regex_lite::Regex;

/// Returned when no line of the output qualifies.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Prefix for the fallback that reports the last substantive line.
pub const UNKNOWN_LAST_LINE_PREFIX: &str = "Unknown error (last line): ";

/// Lines starting with this are build-tool progress markers.
const TASK_PREFIX: &str = "> Task";

/// Build-failure banner, never a useful diagnostic on its own.
const BUILD_FAILED_BANNER: &str = "BUILD FAILED";

/// A single ranked rule for pulling an error description out of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Text following the marker, trimmed. No match if nothing follows it.
    After(&'static str),
    /// The whole cleaned line, if it contains any of the tokens.
    LineContaining(&'static [&'static str]),
}

impl Matcher {
    /// Apply this matcher to one cleaned line.
    pub fn apply(&self, line: &str) -> Option<String> {
        match self {
            Matcher::After(marker) => {
                let (_, rest) = line.split_once(marker)?;
                let rest = rest.trim();
                if rest.is_empty() {
                    None
                } else {
                    Some(rest.to_string())
                }
            }
            Matcher::LineContaining(tokens) => tokens
                .iter()
                .any(|t| line.contains(t))
                .then(|| line.to_string()),
        }
    }
}

/// Matchers in rank order, most specific first.
pub const MATCHERS: &[Matcher] = &[
    Matcher::After("java.lang.IllegalStateException:"),
    Matcher::After("java.lang.IllegalArgumentException:"),
    Matcher::LineContaining(&["Exception:", "Error:"]),
];

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("static ANSI pattern"))
}

/// Remove terminal color sequences and surrounding whitespace.
pub fn strip_ansi(line: &str) -> String {
    ansi_pattern().replace_all(line, "").trim().to_string()
}

/// Extract a single-line error description from combined tool output.
///
/// Never fails and never returns an empty string.
pub fn extract(raw_output: &str) -> String {
    let cleaned: Vec<String> = raw_output.lines().map(strip_ansi).collect();

    let ranked = cleaned
        .iter()
        .rev()
        .find_map(|line| MATCHERS.iter().find_map(|m| m.apply(line)));
    if let Some(found) = ranked {
        return found;
    }

    cleaned
        .iter()
        .rev()
        .find(|line| is_substantive(line))
        .map(|line| format!("{}{}", UNKNOWN_LAST_LINE_PREFIX, line))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

fn is_substantive(line: &str) -> bool {
    !line.is_empty() && !line.starts_with(TASK_PREFIX) && !line.contains(BUILD_FAILED_BANNER)
}
