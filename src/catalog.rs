//! Каталог снапшотов: бакет (label) -> dataset -> записи.
//!
//! Пересобирается из листинга на каждом запуске. Порядок обхода HashMap не
//! фиксирован, ниже по потоку на него никто не опирается.

use std::collections::HashMap;

use crate::naming::SnapshotRecord;
use crate::policy::{Policy, CLEAN};

/// Dataset name -> records of one bucket.
pub type DatasetBuckets = HashMap<String, Vec<SnapshotRecord>>;

#[derive(Debug, Clone, Default)]
pub struct SnapshotCatalog {
    buckets: HashMap<String, DatasetBuckets>,
}

impl SnapshotCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `record` into `bucket` as is (no policy lookup).
    pub fn insert(&mut self, bucket: &str, record: SnapshotRecord) {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .entry(record.dataset.clone())
            .or_default()
            .push(record);
    }

    /// Records of one bucket and dataset.
    pub fn get(&self, bucket: &str, dataset: &str) -> Option<&[SnapshotRecord]> {
        self.buckets
            .get(bucket)
            .and_then(|d| d.get(dataset))
            .map(Vec::as_slice)
    }

    /// All buckets with their per-dataset records.
    pub fn buckets(&self) -> impl Iterator<Item = (&str, &DatasetBuckets)> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|d| d.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group `records` by label: declared intervals get their own bucket,
/// everything else lands in `clean`.
pub fn build_catalog<I>(policy: &Policy, records: I) -> SnapshotCatalog
where
    I: IntoIterator<Item = SnapshotRecord>,
{
    let mut catalog = SnapshotCatalog::new();
    for record in records {
        if policy.is_declared(&record.label) {
            let bucket = record.label.clone();
            catalog.insert(&bucket, record);
        } else {
            catalog.insert(CLEAN, record);
        }
    }
    catalog
}
