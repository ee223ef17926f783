//! Glob-style patterns where `*` is the only special character.

use std::fmt;

use regex::Regex;

use super::PolicyError;

/// A compiled wildcard pattern.
///
/// `*` matches zero or more arbitrary characters (newlines included). Every
/// other character matches itself, so `.` or `(` in a pattern are literal.
/// Matching is anchored: the whole value must match, never a substring.
#[derive(Clone)]
pub struct Wildcard {
    pattern: String,
    regex: Regex,
}

impl Wildcard {
    /// Compile a pattern.
    ///
    /// Fails with [`PolicyError::InvalidPattern`] if the resulting expression
    /// cannot be built (for example, a pattern large enough to exceed the
    /// regex size limit).
    pub fn compile(pattern: &str) -> Result<Self, PolicyError> {
        let expanded = regex::escape(pattern).replace(r"\*", ".*");
        let anchored = format!("(?s)^{expanded}$");

        let regex = Regex::new(&anchored).map_err(|e| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Compile several patterns, failing on the first bad one.
    pub fn compile_all<I, S>(patterns: I) -> Result<Vec<Self>, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|p| Self::compile(p.as_ref()))
            .collect()
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// The source pattern this wildcard was compiled from.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl PartialEq for Wildcard {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Wildcard {}

impl fmt::Debug for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Wildcard").field(&self.pattern).finish()
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
