//! Runtime tunables for a rotation run.
//!
//! The retention policy itself lives in the policy file (see `policy::load`);
//! this covers how autosnap talks to the system:
//! - zfs_bin (ENV AUTOSNAP_ZFS_BIN, default "zfs")
//! - command_timeout_ms (ENV AUTOSNAP_CMD_TIMEOUT_MS, default 60000; 0 = no bound)
//! - dry_run (ENV AUTOSNAP_DRY_RUN = 0|1|true|false|yes|no|on|off, default false)
//!
//! CLI flags override the environment through the `with_*` setters.

use std::fmt;
use std::time::Duration;

pub const ENV_ZFS_BIN: &str = "AUTOSNAP_ZFS_BIN";
pub const ENV_CMD_TIMEOUT_MS: &str = "AUTOSNAP_CMD_TIMEOUT_MS";
pub const ENV_DRY_RUN: &str = "AUTOSNAP_DRY_RUN";

pub const DEFAULT_ZFS_BIN: &str = "zfs";
pub const DEFAULT_CMD_TIMEOUT_MS: u64 = 60_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotateConfig {
    /// Program invoked for every backing-store call.
    pub zfs_bin: String,

    /// Upper bound for a single zfs invocation, milliseconds (0 disables).
    pub command_timeout_ms: u64,

    /// Log intended creates/destroys instead of performing them.
    pub dry_run: bool,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            zfs_bin: DEFAULT_ZFS_BIN.to_string(),
            command_timeout_ms: DEFAULT_CMD_TIMEOUT_MS,
            dry_run: false,
        }
    }
}

fn parse_bool(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

impl RotateConfig {
    /// Defaults overridden by AUTOSNAP_* environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_ZFS_BIN) {
            let s = v.trim();
            if !s.is_empty() {
                cfg.zfs_bin = s.to_string();
            }
        }

        if let Some(v) = lookup(ENV_CMD_TIMEOUT_MS) {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.command_timeout_ms = n;
            }
        }

        if let Some(v) = lookup(ENV_DRY_RUN) {
            cfg.dry_run = parse_bool(&v);
        }

        cfg
    }

    pub fn with_zfs_bin<S: Into<String>>(mut self, bin: S) -> Self {
        self.zfs_bin = bin.into();
        self
    }

    pub fn with_command_timeout_ms(mut self, ms: u64) -> Self {
        self.command_timeout_ms = ms;
        self
    }

    pub fn with_dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    /// Timeout as a Duration; None when unbounded.
    pub fn command_timeout(&self) -> Option<Duration> {
        match self.command_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl fmt::Display for RotateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RotateConfig {{ zfs_bin: {}, command_timeout_ms: {}, dry_run: {} }}",
            self.zfs_bin,
            match self.command_timeout_ms {
                0 => "unbounded".to_string(),
                ms => ms.to_string(),
            },
            self.dry_run,
        )
    }
}
