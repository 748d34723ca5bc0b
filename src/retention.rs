//! Решения retention.
//!
//! `apply_retention` только считает, в store не ходит. По бакетам:
//! - `clean`: удаляется всё;
//! - объявленный интервал: в каждом dataset остаются `retain` самых новых, остальное удаляется;
//! - прочие бакеты (бывают только в каталоге, собранном руками) не трогаем.
//!
//! При равном creation новее считается запись с большим full_name (в имени есть штамп времени).

use std::cmp::Ordering;
use std::collections::BTreeSet;

use log::debug;

use crate::catalog::SnapshotCatalog;
use crate::naming::SnapshotRecord;
use crate::policy::{Policy, CLEAN};

/// Newest first; ties broken by full name, descending.
pub fn newest_first(a: &SnapshotRecord, b: &SnapshotRecord) -> Ordering {
    b.creation
        .cmp(&a.creation)
        .then_with(|| b.full_name.cmp(&a.full_name))
}

/// Snapshots that should be destroyed under `policy`.
pub fn apply_retention(policy: &Policy, catalog: &SnapshotCatalog) -> BTreeSet<SnapshotRecord> {
    let mut doomed = BTreeSet::new();
    for (bucket, datasets) in catalog.buckets() {
        if bucket == CLEAN {
            for records in datasets.values() {
                doomed.extend(records.iter().cloned());
            }
            continue;
        }
        let Some(retain) = policy.retain_count(bucket) else {
            debug!("retention: bucket '{}' is not declared, skipped", bucket);
            continue;
        };
        let retain = retain.get() as usize;
        for (dataset, records) in datasets {
            if records.len() <= retain {
                continue;
            }
            let mut sorted: Vec<&SnapshotRecord> = records.iter().collect();
            sorted.sort_by(|a, b| newest_first(a, b));
            debug!(
                "retention: {} {}: keep {}, expire {}",
                bucket,
                dataset,
                retain,
                sorted.len() - retain
            );
            doomed.extend(sorted.into_iter().skip(retain).cloned());
        }
    }
    doomed
}
