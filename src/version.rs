//! Tolerant version parsing and comparator evaluation
//!
//! Versions found in the wild (`1.8.5-beta`, `2_0`, `3.4.1b`) are reduced to a
//! numeric `(major, minor, patch)` triple. Anything that does not parse as a
//! number becomes zero, so comparison never fails.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Normalized `(major, minor, patch)` triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    /// Parse a free-form version string
    ///
    /// `-` and `_` are treated as field separators, at most three fields are
    /// read and each field keeps only its leading digit run.
    pub fn parse(version: &str) -> Self {
        let normalized = version.trim().replace(['-', '_'], ".");
        let mut nums = [0u64; 3];

        for (slot, part) in nums.iter_mut().zip(normalized.split('.')) {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            *slot = digits.parse().unwrap_or(0);
        }

        Self {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
        }
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Compare two version strings numerically
pub fn compare(current: &str, required: &str) -> Ordering {
    SemVer::parse(current).cmp(&SemVer::parse(required))
}

/// Comparator attached to a catalog advisory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "=")]
    Equal,
    /// Every detected version is affected
    #[serde(rename = "all")]
    All,
}

impl Comparator {
    /// Symbol as written in catalog files
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "=",
            Self::All => "all",
        }
    }

    /// Evaluate `current <op> required`
    pub fn matches(self, current: &str, required: &str) -> bool {
        if self == Self::All {
            return true;
        }
        let ordering = compare(current, required);
        match self {
            Self::Less => ordering == Ordering::Less,
            Self::LessOrEqual => ordering != Ordering::Greater,
            Self::Greater => ordering == Ordering::Greater,
            Self::GreaterOrEqual => ordering != Ordering::Less,
            Self::Equal => ordering == Ordering::Equal,
            Self::All => true,
        }
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(Self::Less),
            "<=" => Ok(Self::LessOrEqual),
            ">" => Ok(Self::Greater),
            ">=" => Ok(Self::GreaterOrEqual),
            "=" => Ok(Self::Equal),
            "all" => Ok(Self::All),
            other => Err(format!("unknown comparator '{}'", other)),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Check `current` against `required` using a comparator symbol
///
/// Unknown symbols never match.
pub fn satisfies(current: &str, required: &str, comparator: &str) -> bool {
    comparator
        .parse::<Comparator>()
        .map(|c| c.matches(current, required))
        .unwrap_or(false)
}
