//! Error taxonomy for autosnap.
//!
//! - ConfigError: malformed policy or unknown command. Fatal, nothing is mutated.
//! - StoreError: a single backing-store call failed. Fatal for listings
//!   (wrapped into AutosnapError::Inventory), logged and skipped for create/destroy.
//! - MalformedName: a tagged snapshot name that cannot be decoded.
//! - AutosnapError: what a rotation cycle can return to its caller.

use std::path::PathBuf;

use thiserror::Error;

/// Policy is malformed, ambiguous, or the requested command is not declared.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: unknown directive '{directive}'")]
    UnknownDirective { line: usize, directive: String },

    #[error("bad {interval} count value '{value}': must be positive integer")]
    BadCount { interval: String, value: String },

    #[error("bad interval name '{0}'")]
    BadIntervalName(String),

    #[error("duplicate interval '{0}'")]
    DuplicateInterval(String),

    #[error("interval name '{0}' not allowed")]
    ReservedInterval(String),

    #[error("spaces not allowed in pattern: '{0}'")]
    PatternWhitespace(String),

    #[error("pattern is malformed: '{pattern}'")]
    BadPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("filter rules do not end in a catch-all '*' rule")]
    MissingCatchAll,

    #[error("unknown command '{0}', interval not defined")]
    UnknownCommand(String),
}

impl ConfigError {
    /// Attach a line number to errors raised by the policy builder while loading a file.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            ConfigError::Syntax { .. }
            | ConfigError::UnknownDirective { .. }
            | ConfigError::Io { .. } => self,
            other => ConfigError::Syntax {
                line,
                message: other.to_string(),
            },
        }
    }
}

/// One backing-store call failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{command} timed out after {after_ms} ms")]
    Timeout { command: String, after_ms: u64 },

    #[error("unexpected listing line '{line}': {message}")]
    Listing { line: String, message: String },

    #[error("{op} failed for '{target}' (injected)")]
    Injected { op: &'static str, target: String },
}

/// A snapshot carries the autosnap tag but its metadata cannot be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed snapshot '{name}': {reason}")]
pub struct MalformedName {
    pub name: String,
    pub reason: String,
}

/// Fatal outcomes of a rotation cycle.
#[derive(Debug, Error)]
pub enum AutosnapError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("can't read {what}: {source}")]
    Inventory {
        what: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AutosnapError {
    /// Process exit code for this failure: 2 for configuration, 1 for inventory.
    pub fn exit_code(&self) -> i32 {
        match self {
            AutosnapError::Configuration(_) => 2,
            AutosnapError::Inventory { .. } => 1,
        }
    }
}
