//! Domain allow-list matching.
//!
//! Decides which origin hostnames are eligible for proxying through the
//! relay. Rules are loaded once at startup into an immutable ordered set;
//! matching is a pure function with no failure modes.

use crate::config::{RelayError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::info;

/// Built-in rules used when no allow-list file is configured.
pub const DEFAULT_RULES: [&str; 3] = [
    "download.jetbrains.com",
    "download-cdn.jetbrains.com",
    "*.jetbrains.com",
];

/// One allow-list rule.
///
/// The rule kind is inferred from the pattern text: a leading `^` makes it
/// a regex, a `*` anywhere makes it a glob, anything else is an exact
/// hostname.
#[derive(Debug, Clone)]
pub enum AllowRule {
    /// Literal hostname, compared case-insensitively.
    Exact(String),
    /// Glob pattern where `*` matches zero or more characters, anchored at
    /// both ends.
    Wildcard(Regex),
    /// Raw regex rule. The leading `^` pins it to the start of the
    /// hostname but the tail is left open, so this is a prefix match.
    /// Looser than a full match, kept for compatibility with deployed
    /// rule files.
    Pattern(Regex),
}

impl AllowRule {
    /// Parses a single rule line.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Pattern`] if the regex or glob fails to compile.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.starts_with('^') {
            let re = Regex::new(pattern).map_err(|source| RelayError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
            Ok(Self::Pattern(re))
        } else if pattern.contains('*') {
            let escaped = regex::escape(pattern).replace(r"\*", ".*");
            let re = Regex::new(&format!("^{escaped}$")).map_err(|source| RelayError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
            Ok(Self::Wildcard(re))
        } else {
            Ok(Self::Exact(pattern.to_ascii_lowercase()))
        }
    }

    fn matches(&self, hostname: &str) -> bool {
        match self {
            Self::Exact(host) => hostname == host,
            Self::Wildcard(re) | Self::Pattern(re) => re.is_match(hostname),
        }
    }
}

/// Ordered allow-list matcher.
#[derive(Debug, Clone, Default)]
pub struct DomainMatcher {
    rules: Vec<AllowRule>,
}

impl DomainMatcher {
    /// Creates a matcher over an already-parsed rule set.
    #[must_use]
    pub fn new(rules: Vec<AllowRule>) -> Self {
        Self { rules }
    }

    /// Builds a matcher from raw pattern lines.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn from_patterns<'a, I>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let rules = patterns
            .into_iter()
            .map(AllowRule::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Checks whether a hostname is eligible for proxying.
    ///
    /// Hostnames are lower-cased first; rules are tried in declaration
    /// order and the first match wins. An empty rule set matches nothing.
    #[must_use]
    pub fn allowed(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        self.rules.iter().any(|rule| rule.matches(&hostname))
    }

    /// Number of loaded rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the rule set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Loads allow-list rules from a file, one pattern per line.
///
/// Blank lines and lines starting with `#` are ignored. When `path` is
/// `None` or the file does not exist, the built-in [`DEFAULT_RULES`] are
/// used instead.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, or if any
/// pattern fails to compile.
pub fn load_rules(path: Option<&Path>) -> Result<Vec<AllowRule>> {
    let Some(path) = path.filter(|p| p.exists()) else {
        info!(
            count = DEFAULT_RULES.len(),
            "No allow-list file, using default domains"
        );
        return DEFAULT_RULES
            .iter()
            .map(|p| AllowRule::parse(p))
            .collect();
    };

    let contents = fs::read_to_string(path)
        .map_err(|e| RelayError::AllowList(format!("failed to read {}: {e}", path.display())))?;

    let rules = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(AllowRule::parse)
        .collect::<Result<Vec<_>>>()?;

    info!(count = rules.len(), file = %path.display(), "Loaded allow-list");
    Ok(rules)
}
