//! Retention policy: declared intervals with retain counts, plus dataset filter.
//!
//! A Policy only comes out of `PolicyBuilder::build` (the file loader in
//! `load` uses the builder too), so every Policy in hand satisfies:
//! - each interval keeps at least one snapshot,
//! - no interval is named `clean`,
//! - filter rules are compiled and end in the catch-all `include *`.

pub mod load;

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::error::ConfigError;
use crate::filter::{validate_pattern, FilterRule, FilterSet, CATCH_ALL};
use crate::naming;

pub use load::{load_policy, parse_policy};

/// Reserved bucket / command name for snapshots whose interval is not declared.
pub const CLEAN: &str = "clean";

/// What one run was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create snapshots labeled with this interval, then prune.
    Interval(String),
    /// Only prune.
    Clean,
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Command::Interval(name) => name,
            Command::Clean => CLEAN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Policy {
    intervals: BTreeMap<String, NonZeroU32>,
    filter: FilterSet,
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    /// Retain count of a declared interval.
    pub fn retain_count(&self, interval: &str) -> Option<NonZeroU32> {
        self.intervals.get(interval).copied()
    }

    pub fn is_declared(&self, interval: &str) -> bool {
        self.intervals.contains_key(interval)
    }

    /// Declared intervals, by name.
    pub fn intervals(&self) -> impl Iterator<Item = (&str, NonZeroU32)> {
        self.intervals.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether snapshots are taken of `dataset`.
    pub fn included(&self, dataset: &str) -> bool {
        self.filter.included(dataset)
    }

    pub fn filter(&self) -> &FilterSet {
        &self.filter
    }

    /// Resolve a command-line word: a declared interval or `clean`.
    pub fn command(&self, word: &str) -> Result<Command, ConfigError> {
        if word == CLEAN {
            Ok(Command::Clean)
        } else if self.is_declared(word) {
            Ok(Command::Interval(word.to_string()))
        } else {
            Err(ConfigError::UnknownCommand(word.to_string()))
        }
    }
}

/// Collects intervals and filter rules; `build()` validates the lot.
///
/// Errors are reported at the call that introduced them and remembered, so a
/// chain of calls can end in a single `build()?`.
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    intervals: BTreeMap<String, NonZeroU32>,
    rules: Vec<FilterRule>,
    error: Option<ConfigError>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` keeping `count` snapshots per dataset.
    pub fn try_interval(&mut self, name: &str, count: i64) -> Result<(), ConfigError> {
        if name == CLEAN {
            return Err(ConfigError::ReservedInterval(name.to_string()));
        }
        // Labels must decode back to themselves or their snapshots land in `clean`.
        if !naming::is_valid_label(name) {
            return Err(ConfigError::BadIntervalName(name.to_string()));
        }
        let count = u32::try_from(count)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| ConfigError::BadCount {
                interval: name.to_string(),
                value: count.to_string(),
            })?;
        if self.intervals.contains_key(name) {
            return Err(ConfigError::DuplicateInterval(name.to_string()));
        }
        self.intervals.insert(name.to_string(), count);
        Ok(())
    }

    /// Append an include/exclude rule. The pattern is checked right away.
    pub fn try_rule(&mut self, rule: FilterRule) -> Result<(), ConfigError> {
        validate_pattern(&rule.pattern)?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn interval(mut self, name: &str, count: i64) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.try_interval(name, count) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn include(self, pattern: &str) -> Self {
        self.rule(FilterRule::include(pattern))
    }

    pub fn exclude(self, pattern: &str) -> Self {
        self.rule(FilterRule::exclude(pattern))
    }

    fn rule(mut self, rule: FilterRule) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.try_rule(rule) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Finish: append the catch-all `include *` and compile the filter.
    pub fn build(self) -> Result<Policy, ConfigError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut rules = self.rules;
        rules.push(FilterRule::include(CATCH_ALL));
        let filter = FilterSet::from_rules(rules)?;
        Ok(Policy {
            intervals: self.intervals,
            filter,
        })
    }
}
