//! In-memory backing store.
//!
//! Datasets и снапшоты в упорядоченных map за RefCell (цикл однопоточный).
//! Любой листинг и любую мутацию можно заставить упасть; успешные мутации
//! пишутся в журнал.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{TimeZone, Utc};

use super::{BackingStore, RawSnapshot};
use crate::error::StoreError;
use crate::naming::{self, SnapshotRecord};

/// A successful mutation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Created(String),
    Destroyed(String),
}

#[derive(Debug, Default)]
struct Inner {
    datasets: BTreeSet<String>,
    // name -> creation column
    snapshots: BTreeMap<String, String>,
    now: i64,

    fail_list_datasets: bool,
    fail_list_snapshots: bool,
    fail_create: BTreeSet<String>,
    fail_destroy: BTreeSet<String>,

    journal: Vec<Mutation>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RefCell<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, name: &str) -> Self {
        self.add_dataset(name);
        self
    }

    pub fn with_snapshot(self, name: &str, creation: i64) -> Self {
        self.add_snapshot(name, creation);
        self
    }

    pub fn add_dataset(&self, name: &str) {
        self.inner.borrow_mut().datasets.insert(name.to_string());
    }

    pub fn add_snapshot(&self, name: &str, creation: i64) {
        self.add_raw_snapshot(name, &creation.to_string());
    }

    /// Add a snapshot with an arbitrary creation column (e.g. garbage).
    pub fn add_raw_snapshot(&self, name: &str, creation: &str) {
        self.inner
            .borrow_mut()
            .snapshots
            .insert(name.to_string(), creation.to_string());
    }

    /// Clock used for new snapshot names and their creation time, Unix seconds.
    pub fn set_now(&self, epoch: i64) {
        self.inner.borrow_mut().now = epoch;
    }

    pub fn fail_dataset_listing(&self) {
        self.inner.borrow_mut().fail_list_datasets = true;
    }

    pub fn fail_snapshot_listing(&self) {
        self.inner.borrow_mut().fail_list_snapshots = true;
    }

    /// Make `create_snapshot` fail for `dataset`.
    pub fn fail_create(&self, dataset: &str) {
        self.inner
            .borrow_mut()
            .fail_create
            .insert(dataset.to_string());
    }

    /// Make `destroy_snapshot` fail for `full_name`.
    pub fn fail_destroy(&self, full_name: &str) {
        self.inner
            .borrow_mut()
            .fail_destroy
            .insert(full_name.to_string());
    }

    pub fn snapshot_names(&self) -> BTreeSet<String> {
        self.inner.borrow().snapshots.keys().cloned().collect()
    }

    pub fn journal(&self) -> Vec<Mutation> {
        self.inner.borrow().journal.clone()
    }
}

impl BackingStore for MemoryStore {
    fn list_datasets(&self) -> Result<BTreeSet<String>, StoreError> {
        let inner = self.inner.borrow();
        if inner.fail_list_datasets {
            return Err(StoreError::Injected {
                op: "list_datasets",
                target: "*".to_string(),
            });
        }
        Ok(inner.datasets.clone())
    }

    fn list_snapshots(&self) -> Result<Vec<RawSnapshot>, StoreError> {
        let inner = self.inner.borrow();
        if inner.fail_list_snapshots {
            return Err(StoreError::Injected {
                op: "list_snapshots",
                target: "*".to_string(),
            });
        }
        Ok(inner
            .snapshots
            .iter()
            .map(|(name, creation)| RawSnapshot::new(name.as_str(), creation.as_str()))
            .collect())
    }

    fn planned_snapshot(&self, dataset: &str, label: &str) -> SnapshotRecord {
        let now = self.inner.borrow().now;
        let stamp = Utc.timestamp_opt(now, 0).single().unwrap_or_default();
        SnapshotRecord {
            full_name: naming::encode(dataset, label, &stamp),
            dataset: dataset.to_string(),
            label: label.to_string(),
            creation: now,
        }
    }

    fn create_snapshot(&self, dataset: &str, label: &str) -> Result<String, StoreError> {
        let planned = self.planned_snapshot(dataset, label);
        let mut inner = self.inner.borrow_mut();
        if inner.fail_create.contains(dataset) {
            return Err(StoreError::Injected {
                op: "create_snapshot",
                target: dataset.to_string(),
            });
        }
        if !inner.datasets.contains(dataset) {
            return Err(StoreError::Failed {
                command: format!("snapshot {dataset}"),
                status: "1".to_string(),
                stderr: format!("dataset does not exist: {dataset}"),
            });
        }
        let name = planned.full_name;
        if inner.snapshots.contains_key(&name) {
            return Err(StoreError::Failed {
                command: format!("snapshot {name}"),
                status: "1".to_string(),
                stderr: format!("dataset already exists: {name}"),
            });
        }
        inner
            .snapshots
            .insert(name.clone(), planned.creation.to_string());
        inner.journal.push(Mutation::Created(name.clone()));
        Ok(name)
    }

    fn destroy_snapshot(&self, full_name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_destroy.contains(full_name) {
            return Err(StoreError::Injected {
                op: "destroy_snapshot",
                target: full_name.to_string(),
            });
        }
        if inner.snapshots.remove(full_name).is_none() {
            return Err(StoreError::Failed {
                command: format!("destroy {full_name}"),
                status: "1".to_string(),
                stderr: format!("could not find any snapshots to destroy: {full_name}"),
            });
        }
        inner.journal.push(Mutation::Destroyed(full_name.to_string()));
        Ok(())
    }
}
