//! Error signatures for tool output.
//!
//! Turns the noisy, possibly ANSI-colored output of a failed tool run into a
//! single-line error description, then collapses instance-specific identifiers
//! so structurally identical failures land in the same bucket.

mod extract;
mod normalize;

pub use extract::{extract, strip_ansi, Matcher, MATCHERS, UNKNOWN_ERROR, UNKNOWN_LAST_LINE_PREFIX};
pub use normalize::{normalize, Substitution, SUBSTITUTIONS};

/// Extract and normalize in one step.
///
/// This is the signature used as an aggregation key for failed runs.
pub fn bucket(raw_output: &str) -> String {
    normalize(&extract(raw_output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_illegal_argument() {
        let output = "> Task :run\njava.lang.IllegalArgumentException: bad var_17 at arg3\n";
        assert_eq!(bucket(output), "bad var_XXX at argXXX");
    }

    #[test]
    fn test_bucket_empty_output() {
        assert_eq!(bucket(""), UNKNOWN_ERROR);
    }

    #[test]
    fn test_bucket_collapses_numbering() {
        let a = bucket("Error: cannot resolve const_1 in t_4");
        let b = bucket("Error: cannot resolve const_22 in t_90");
        assert_eq!(a, b);
        assert_eq!(a, "Error: cannot resolve const_XXX in t_XXX");
    }
}
