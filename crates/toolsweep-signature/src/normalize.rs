//! Identifier normalization.
//!
//! Tool-generated names carry a numeric suffix (`var_17`, `arg3`, `t_4`,
//! `const_2`). Replacing the suffix with a placeholder lets two errors that
//! differ only in numbering share a bucket.

use std::sync::OnceLock;

use regex_lite::Regex;

/// One pattern substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution {
    pub pattern: &'static str,
    pub replacement: &'static str,
}

/// Substitutions, applied in this order.
///
/// `t_\d+` also matches the tail of `const_\d+`; both orders yield
/// `const_XXX`, but the order is fixed so output never depends on it.
pub const SUBSTITUTIONS: &[Substitution] = &[
    Substitution {
        pattern: r"var_\d+",
        replacement: "var_XXX",
    },
    Substitution {
        pattern: r"arg\d+",
        replacement: "argXXX",
    },
    Substitution {
        pattern: r"t_\d+",
        replacement: "t_XXX",
    },
    Substitution {
        pattern: r"const_\d+",
        replacement: "const_XXX",
    },
];

fn compiled() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        SUBSTITUTIONS
            .iter()
            .map(|s| {
                let re = Regex::new(s.pattern).expect("static substitution pattern");
                (re, s.replacement)
            })
            .collect()
    })
}

/// Replace volatile identifiers with stable placeholders.
pub fn normalize(text: &str) -> String {
    compiled()
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}
