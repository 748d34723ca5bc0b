//! `zfs` command-line backing store.
//!
//! Commands:
//! - datasets:  zfs list -H -o name
//! - snapshots: zfs list -H -p -o name,creation -t snapshot
//! - create:    zfs snapshot <dataset>@autosnap.<stamp>.<label>
//! - destroy:   zfs destroy <snapshot>
//!
//! Each call is bounded by the configured timeout; on expiry the child is
//! killed. stdout/stderr are drained on helper threads while we wait.

use std::collections::BTreeSet;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::{BackingStore, RawSnapshot};
use crate::config::RotateConfig;
use crate::error::StoreError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ZfsCli {
    program: String,
    // Arguments placed before every subcommand (e.g. a wrapper script).
    prefix_args: Vec<String>,
    timeout: Option<Duration>,
}

struct Output {
    stdout: String,
    stderr: String,
}

impl ZfsCli {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(cfg: &RotateConfig) -> Self {
        Self::new(cfg.zfs_bin.clone()).with_timeout(cfg.command_timeout())
    }

    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut s = self.program.clone();
        for a in self.prefix_args.iter().map(String::as_str).chain(args.iter().copied()) {
            s.push(' ');
            s.push_str(a);
        }
        s
    }

    fn run(&self, args: &[&str]) -> Result<Output, StoreError> {
        let command = self.describe(args);
        debug!("exec: {}", command);

        let mut child = Command::new(&self.program)
            .args(&self.prefix_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| StoreError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let out = drain(child.stdout.take());
        let err = drain(child.stderr.take());

        let status = match wait_bounded(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Readers are left detached: grandchildren may still hold the pipes.
                let _ = child.kill();
                let _ = child.wait();
                return Err(StoreError::Timeout {
                    command,
                    after_ms: self.timeout.map_or(0, |t| t.as_millis() as u64),
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(StoreError::Failed {
                    command,
                    status: "unknown".to_string(),
                    stderr: e.to_string(),
                });
            }
        };

        let output = Output {
            stdout: join(out),
            stderr: join(err),
        };
        if !status.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(StoreError::Failed {
                command,
                status: status.to_string(),
                stderr: detail,
            });
        }
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || pipe.map(read_lossy).unwrap_or_default())
}

/// Everything readable from `r`. A read error keeps what came before it.
fn read_lossy<R: Read>(mut r: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = r.read_to_end(&mut buf) {
        debug!("pipe read stopped after {} bytes: {}", buf.len(), e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn join(h: JoinHandle<String>) -> String {
    h.join().unwrap_or_default()
}

/// Wait for `child`; Ok(None) when `timeout` expires first.
fn wait_bounded(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Parse `name<TAB>creation` lines of `zfs list -H -p -o name,creation`.
pub fn parse_snapshot_listing(text: &str) -> Result<Vec<RawSnapshot>, StoreError> {
    non_empty_lines(text)
        .map(|line| {
            let (name, creation) = line.split_once('\t').ok_or_else(|| StoreError::Listing {
                line: line.to_string(),
                message: "expected <name>\\t<creation>".to_string(),
            })?;
            Ok(RawSnapshot::new(name.trim(), creation.trim()))
        })
        .collect()
}

/// Parse `zfs list -H -o name` output.
pub fn parse_dataset_listing(text: &str) -> BTreeSet<String> {
    non_empty_lines(text).map(str::to_string).collect()
}

impl BackingStore for ZfsCli {
    fn list_datasets(&self) -> Result<BTreeSet<String>, StoreError> {
        let out = self.run(&["list", "-H", "-o", "name"])?;
        Ok(parse_dataset_listing(&out.stdout))
    }

    fn list_snapshots(&self) -> Result<Vec<RawSnapshot>, StoreError> {
        let out = self.run(&["list", "-H", "-p", "-o", "name,creation", "-t", "snapshot"])?;
        parse_snapshot_listing(&out.stdout)
    }

    fn create_snapshot(&self, dataset: &str, label: &str) -> Result<String, StoreError> {
        let name = self.planned_snapshot(dataset, label).full_name;
        let out = self.run(&["snapshot", name.as_str()])?;
        for line in non_empty_lines(&out.stderr) {
            warn!("create snapshot {}: {}", name, line);
        }
        Ok(name)
    }

    fn destroy_snapshot(&self, full_name: &str) -> Result<(), StoreError> {
        let out = self.run(&["destroy", full_name])?;
        for line in non_empty_lines(&out.stderr) {
            warn!("destroy snapshot {}: {}", full_name, line);
        }
        Ok(())
    }
}
