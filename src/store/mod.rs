//! Backing store: шов между циклом ротации и хранилищем.
//!
//! - zfs.rs: `ZfsCli`, вызывает бинарь `zfs`;
//! - memory.rs: `MemoryStore`, in-process store с инъекцией отказов.
//!
//! Оркестратор видит только `&dyn BackingStore`, глобального состояния нет.

use std::collections::BTreeSet;

use chrono::Local;

use crate::error::StoreError;
use crate::naming::{self, SnapshotRecord};

pub mod memory;
pub mod zfs;

pub use memory::{MemoryStore, Mutation};
pub use zfs::ZfsCli;

/// One line of the snapshot listing, as reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    pub name: String,
    /// Creation time column, Unix seconds as text.
    pub creation: String,
}

impl RawSnapshot {
    pub fn new<N: Into<String>, C: Into<String>>(name: N, creation: C) -> Self {
        Self {
            name: name.into(),
            creation: creation.into(),
        }
    }
}

pub trait BackingStore {
    /// Names of all datasets.
    fn list_datasets(&self) -> Result<BTreeSet<String>, StoreError>;

    /// All snapshots of all datasets, with their creation time.
    fn list_snapshots(&self) -> Result<Vec<RawSnapshot>, StoreError>;

    /// The record `create_snapshot(dataset, label)` would produce right now.
    /// Dry runs feed it to retention in place of a real create.
    fn planned_snapshot(&self, dataset: &str, label: &str) -> SnapshotRecord {
        let now = Local::now();
        SnapshotRecord {
            full_name: naming::encode(dataset, label, &now),
            dataset: dataset.to_string(),
            label: label.to_string(),
            creation: now.timestamp(),
        }
    }

    /// Take a snapshot of `dataset` labeled `label`; returns the new snapshot name.
    fn create_snapshot(&self, dataset: &str, label: &str) -> Result<String, StoreError>;

    fn destroy_snapshot(&self, full_name: &str) -> Result<(), StoreError>;
}
