//! Java language-compliance levels.
//!
//! A compliance level orders toolchains and projects: a project declaring
//! `javaCompliance=1.8` can only be compiled by a toolchain of level 1.8
//! or higher. Both the legacy `1.x` spelling and the bare `x` spelling
//! parse to the same level.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};

/// A Java source/target compliance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JavaCompliance(u32);

impl JavaCompliance {
    /// Construct from a major version number (8 for Java 8, 17 for 17).
    pub fn new(value: u32) -> Self {
        JavaCompliance(value)
    }

    /// The major version number.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Whether a toolchain of this level can compile sources requiring
    /// `required`.
    pub fn satisfies(&self, required: JavaCompliance) -> bool {
        *self >= required
    }
}

impl FromStr for JavaCompliance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s.strip_prefix("1.").unwrap_or(s);
        match digits.parse::<u32>() {
            Ok(v) if v > 0 => Ok(JavaCompliance(v)),
            _ => bail!("invalid Java compliance level: `{}`", s),
        }
    }
}

impl fmt::Display for JavaCompliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= 8 {
            write!(f, "1.{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl TryFrom<String> for JavaCompliance {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<JavaCompliance> for String {
    fn from(c: JavaCompliance) -> String {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legacy_and_bare_forms() {
        assert_eq!("1.8".parse::<JavaCompliance>().unwrap().value(), 8);
        assert_eq!("8".parse::<JavaCompliance>().unwrap().value(), 8);
        assert_eq!("17".parse::<JavaCompliance>().unwrap().value(), 17);
        assert!("".parse::<JavaCompliance>().is_err());
        assert!("1.x".parse::<JavaCompliance>().is_err());
    }

    #[test]
    fn test_ordering_and_display() {
        let j7: JavaCompliance = "1.7".parse().unwrap();
        let j8: JavaCompliance = "8".parse().unwrap();
        let j17: JavaCompliance = "17".parse().unwrap();

        assert!(j7 < j8);
        assert!(j8.satisfies(j7));
        assert!(!j7.satisfies(j8));
        assert_eq!(j8.to_string(), "1.8");
        assert_eq!(j17.to_string(), "17");
    }
}
