//! Один цикл ротации.
//!
//! 1. Команда-интервал: листинг datasets, снапшот каждого включённого фильтром.
//! 2. Всегда: листинг снапшотов, decode, каталог, удаление того, что отдал retention.
//!
//! Ошибка листинга обрывает цикл до следующего прохода мутаций (без полной
//! инвентаризации решать нечего). Отдельные отказы create/destroy пишем в лог,
//! считаем в отчёте и идём дальше.
//!
//! Dry-run: store не мутируется; снапшоты, которые создал бы проход create,
//! подмешиваются в инвентаризацию, чтобы отчёт совпал с настоящим запуском.

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::catalog::build_catalog;
use crate::error::{AutosnapError, ConfigError};
use crate::naming::{self, SnapshotRecord};
use crate::policy::{Command, Policy};
use crate::retention::apply_retention;
use crate::store::BackingStore;

#[derive(Debug, Clone, Default)]
pub struct RotateOptions {
    /// Log intended mutations without calling the store.
    pub dry_run: bool,
}

/// What a cycle did (or, in dry-run mode, would have done).
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub command: String,
    pub dry_run: bool,
    /// Datasets that passed the filter.
    pub datasets_included: usize,
    pub created: Vec<String>,
    /// Datasets whose snapshot could not be created.
    pub create_failed: Vec<String>,
    /// Autosnap snapshots found in the listing.
    pub snapshots_seen: usize,
    /// Listed snapshots not owned by autosnap.
    pub foreign_skipped: usize,
    /// Tagged snapshots that could not be decoded.
    pub malformed: Vec<String>,
    pub destroyed: Vec<String>,
    pub destroy_failed: Vec<String>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "{}{}: created {} (failed {}), destroyed {} (failed {}), seen {}, skipped {} foreign / {} malformed",
            self.command,
            if self.dry_run { " [dry-run]" } else { "" },
            self.created.len(),
            self.create_failed.len(),
            self.destroyed.len(),
            self.destroy_failed.len(),
            self.snapshots_seen,
            self.foreign_skipped,
            self.malformed.len(),
        )
    }

    /// True when every attempted mutation succeeded.
    pub fn is_clean(&self) -> bool {
        self.create_failed.is_empty() && self.destroy_failed.is_empty()
    }
}

/// Run one cycle of `command` against `store`.
pub fn execute(
    policy: &Policy,
    command: &Command,
    store: &dyn BackingStore,
    opts: &RotateOptions,
) -> Result<RunReport, AutosnapError> {
    let mut report = RunReport {
        command: command.as_str().to_string(),
        dry_run: opts.dry_run,
        ..RunReport::default()
    };

    // Dry run: snapshots the create pass would have made.
    let mut planned = Vec::new();
    if let Command::Interval(label) = command {
        if !policy.is_declared(label) {
            return Err(ConfigError::UnknownCommand(label.clone()).into());
        }
        planned = create_pass(policy, label, store, opts, &mut report)?;
    }

    let mut records = inventory(store, &mut report)?;
    for record in &planned {
        if !records.iter().any(|r| r.full_name == record.full_name) {
            records.push(record.clone());
        }
    }
    let catalog = build_catalog(policy, records);
    let doomed = apply_retention(policy, &catalog);
    debug!(
        "retention: {} of {} snapshot(s) expire",
        doomed.len(),
        catalog.len()
    );
    destroy_pass(
        doomed.iter().filter(|r| !planned.contains(r)),
        store,
        opts,
        &mut report,
    );

    Ok(report)
}

fn create_pass(
    policy: &Policy,
    label: &str,
    store: &dyn BackingStore,
    opts: &RotateOptions,
    report: &mut RunReport,
) -> Result<Vec<SnapshotRecord>, AutosnapError> {
    let mut planned = Vec::new();
    let datasets = store
        .list_datasets()
        .map_err(|source| AutosnapError::Inventory {
            what: "datasets",
            source,
        })?;

    for dataset in datasets.iter().filter(|d| policy.included(d)) {
        report.datasets_included += 1;
        if opts.dry_run {
            let record = store.planned_snapshot(dataset, label);
            info!("dry-run: would create snapshot {}", record.full_name);
            report.created.push(record.full_name.clone());
            planned.push(record);
            continue;
        }
        match store.create_snapshot(dataset, label) {
            Ok(name) => {
                info!("created snapshot {}", name);
                report.created.push(name);
            }
            Err(e) => {
                error!("create snapshot of {}: {}", dataset, e);
                report.create_failed.push(dataset.clone());
            }
        }
    }
    Ok(planned)
}

fn inventory(
    store: &dyn BackingStore,
    report: &mut RunReport,
) -> Result<Vec<SnapshotRecord>, AutosnapError> {
    let listing = store
        .list_snapshots()
        .map_err(|source| AutosnapError::Inventory {
            what: "snapshots",
            source,
        })?;

    let mut records = Vec::with_capacity(listing.len());
    for raw in listing {
        match naming::decode(&raw.name, &raw.creation) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => report.foreign_skipped += 1,
            Err(e) => {
                warn!("skipping {}", e);
                report.malformed.push(raw.name);
            }
        }
    }
    report.snapshots_seen = records.len();
    Ok(records)
}

fn destroy_pass<'a, I>(doomed: I, store: &dyn BackingStore, opts: &RotateOptions, report: &mut RunReport)
where
    I: IntoIterator<Item = &'a SnapshotRecord>,
{
    for record in doomed {
        if opts.dry_run {
            info!("dry-run: would destroy snapshot {}", record.full_name);
            report.destroyed.push(record.full_name.clone());
            continue;
        }
        match store.destroy_snapshot(&record.full_name) {
            Ok(()) => {
                info!("destroyed snapshot {}", record.full_name);
                report.destroyed.push(record.full_name.clone());
            }
            Err(e) => {
                error!("delete snapshot {}: {}", record.full_name, e);
                report.destroy_failed.push(record.full_name.clone());
            }
        }
    }
}
