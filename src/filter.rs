//! Ordered include/exclude dataset filter.
//!
//! Rules are checked top to bottom, the first matching pattern decides. The
//! last rule must be a catch-all `*`; it is split off at construction so that
//! `included()` always has an answer.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::ConfigError;

/// Pattern of the catch-all rule closing every filter.
pub const CATCH_ALL: &str = "*";

/// One `include` / `exclude` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub included: bool,
    pub pattern: String,
}

impl FilterRule {
    pub fn include<S: Into<String>>(pattern: S) -> Self {
        Self {
            included: true,
            pattern: pattern.into(),
        }
    }

    pub fn exclude<S: Into<String>>(pattern: S) -> Self {
        Self {
            included: false,
            pattern: pattern.into(),
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.pattern == CATCH_ALL
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: FilterRule,
    matcher: GlobMatcher,
}

/// Compiled filter rules.
#[derive(Debug, Clone)]
pub struct FilterSet {
    rules: Vec<CompiledRule>,
    fallback: FilterRule,
}

/// Check one pattern without compiling it into a set.
pub fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    compile(pattern).map(|_| ())
}

fn compile(pattern: &str) -> Result<GlobMatcher, ConfigError> {
    if pattern.chars().any(char::is_whitespace) {
        return Err(ConfigError::PatternWhitespace(pattern.to_string()));
    }
    // Dataset names are flat strings: `*` crosses `/`.
    let glob = GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map_err(|source| ConfigError::BadPattern {
            pattern: pattern.to_string(),
            source,
        })?;
    Ok(glob.compile_matcher())
}

impl FilterSet {
    /// Compile `rules`. The last rule must be the catch-all.
    pub fn from_rules(mut rules: Vec<FilterRule>) -> Result<Self, ConfigError> {
        let fallback = match rules.pop() {
            Some(last) if last.is_catch_all() => last,
            _ => return Err(ConfigError::MissingCatchAll),
        };
        let rules = rules
            .into_iter()
            .map(|rule| {
                let matcher = compile(&rule.pattern)?;
                Ok(CompiledRule { rule, matcher })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules, fallback })
    }

    /// Whether `dataset` gets snapshots. Total: the catch-all answers when nothing else matches.
    pub fn included(&self, dataset: &str) -> bool {
        self.rules
            .iter()
            .find(|r| r.rule.is_catch_all() || r.matcher.is_match(dataset))
            .map_or(self.fallback.included, |r| r.rule.included)
    }

    /// Rules in evaluation order, catch-all last.
    pub fn rules(&self) -> impl Iterator<Item = &FilterRule> {
        self.rules
            .iter()
            .map(|r| &r.rule)
            .chain(std::iter::once(&self.fallback))
    }
}
