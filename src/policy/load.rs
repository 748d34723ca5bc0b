//! Policy file loader.
//!
//! One directive per line, `#` starts a comment, tabs count as spaces:
//!
//! ```text
//! interval hourly 24
//! interval daily  7
//! exclude  tank/tmp*
//! include  tank/*
//! exclude  *
//! ```
//!
//! Any bad line fails the whole load; no partial policy is returned.

use std::fs;
use std::path::Path;

use log::debug;

use super::{Policy, PolicyBuilder};
use crate::error::ConfigError;
use crate::filter::FilterRule;

/// Read and parse the policy file at `path`.
pub fn load_policy(path: &Path) -> Result<Policy, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let policy = parse_policy(&text)?;
    debug!(
        "loaded policy from {}: {} interval(s)",
        path.display(),
        policy.intervals().count()
    );
    Ok(policy)
}

/// Parse policy directives from `text`.
pub fn parse_policy(text: &str) -> Result<Policy, ConfigError> {
    let mut builder = PolicyBuilder::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let mut words = line.split_whitespace();
        let Some(directive) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        apply_directive(&mut builder, directive, &args, line_no)
            .map_err(|e| e.at_line(line_no))?;
    }
    builder.build()
}

fn apply_directive(
    builder: &mut PolicyBuilder,
    directive: &str,
    args: &[&str],
    line: usize,
) -> Result<(), ConfigError> {
    match directive {
        "interval" => {
            let [name, count] = args else {
                return Err(ConfigError::Syntax {
                    line,
                    message: "usage: interval <name> <count>".to_string(),
                });
            };
            let count = count.parse::<i64>().map_err(|_| ConfigError::BadCount {
                interval: name.to_string(),
                value: count.to_string(),
            })?;
            builder.try_interval(name, count)
        }
        "include" | "exclude" => {
            let pattern = match args {
                [pattern] => *pattern,
                [] => {
                    return Err(ConfigError::Syntax {
                        line,
                        message: format!("usage: {} <pattern>", directive),
                    })
                }
                _ => return Err(ConfigError::PatternWhitespace(args.join(" "))),
            };
            let rule = if directive == "include" {
                FilterRule::include(pattern)
            } else {
                FilterRule::exclude(pattern)
            };
            builder.try_rule(rule)
        }
        other => Err(ConfigError::UnknownDirective {
            line,
            directive: other.to_string(),
        }),
    }
}
