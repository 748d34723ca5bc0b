use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;

use crate::config::RotateConfig;
use crate::error::AutosnapError;
use crate::policy::load_policy;
use crate::rotate::{execute, RotateOptions, RunReport};
use crate::store::ZfsCli;

pub const DEFAULT_CONFIG: &str = "/opt/autosnap/conf/autosnap.conf";

// autosnap: периодические ZFS-снапшоты с ротацией по интервалам
#[derive(Parser, Debug)]
#[command(
    name = "autosnap",
    version,
    about = "Create labeled ZFS snapshots and prune them per retention policy",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Policy file (interval/include/exclude directives)
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Interval declared in the config, or `clean` to prune only
    pub command: String,

    /// Log creates/destroys without running them (also AUTOSNAP_DRY_RUN)
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// zfs program to run (also AUTOSNAP_ZFS_BIN)
    #[arg(long)]
    pub zfs: Option<String>,

    /// Per-call timeout in milliseconds, 0 = none (also AUTOSNAP_CMD_TIMEOUT_MS)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl Cli {
    /// Runtime settings: environment first, then flags on top.
    pub fn rotate_config(&self) -> RotateConfig {
        let mut cfg = RotateConfig::from_env();
        if let Some(bin) = &self.zfs {
            cfg = cfg.with_zfs_bin(bin.clone());
        }
        if let Some(ms) = self.timeout_ms {
            cfg = cfg.with_command_timeout_ms(ms);
        }
        if self.dry_run {
            cfg = cfg.with_dry_run(true);
        }
        cfg
    }
}

pub fn run() -> Result<()> {
    run_with(Cli::parse()).map(|_| ())
}

/// Load the policy, resolve the command, run one cycle with the zfs store.
pub fn run_with(cli: Cli) -> Result<RunReport> {
    let policy = load_policy(&cli.config)
        .map_err(AutosnapError::from)
        .with_context(|| format!("error parsing config '{}'", cli.config.display()))?;
    let command = policy
        .command(&cli.command)
        .map_err(AutosnapError::from)?;

    let cfg = cli.rotate_config();
    debug!("{}", cfg);
    let store = ZfsCli::from_config(&cfg);
    let opts = RotateOptions {
        dry_run: cfg.dry_run,
    };

    let report = execute(&policy, &command, &store, &opts)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!("{}", report.summary());
    }
    Ok(report)
}

/// Exit code for a failed run: 2 for config/usage, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<AutosnapError>())
        .map_or(1, AutosnapError::exit_code)
}
