//! Snapshot naming codec.
//!
//! Format: `<dataset>@autosnap.<YYYY-MM-DD.HH:MM:SS>.<label>`
//!
//! The stamp has one-second resolution: two snapshots of the same dataset and
//! label taken within one second get the same name, and the second create fails.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::error::MalformedName;

/// Tag every snapshot owned by autosnap starts with (right after `@`).
pub const AUTOSNAP_TAG: &str = "autosnap";

/// Label assigned when a tagged name carries no label at all.
pub const UNKNOWN_LABEL: &str = "unknown";

/// strftime pattern of the stamp between the tag and the label.
pub const STAMP_FORMAT: &str = "%Y-%m-%d.%H:%M:%S";

/// Decoded autosnap snapshot. Ordered by full name first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SnapshotRecord {
    pub full_name: String,
    pub dataset: String,
    pub label: String,
    /// Creation time as reported by the backing store, Unix seconds.
    pub creation: i64,
}

/// Characters a label may not contain: `.` splits the label off on decode,
/// `@`, `/` and `#` are ZFS name separators.
const LABEL_FORBIDDEN: [char; 4] = ['.', '@', '/', '#'];

/// Whether `label` comes back unchanged from `decode(encode(..))`.
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| !c.is_whitespace() && !LABEL_FORBIDDEN.contains(&c))
}

/// Build a snapshot name for `dataset` labeled `label`, stamped with `now`.
pub fn encode<Tz>(dataset: &str, label: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}@{}.{}.{}",
        dataset,
        AUTOSNAP_TAG,
        now.format(STAMP_FORMAT),
        label
    )
}

/// Decode one listed snapshot.
///
/// Ok(None): not an autosnap snapshot (no `@`, or the part after `@` does not
/// start with the tag); the caller skips it.
pub fn decode(raw_name: &str, raw_creation: &str) -> Result<Option<SnapshotRecord>, MalformedName> {
    let Some((dataset, rest)) = raw_name.split_once('@') else {
        return Ok(None);
    };
    if !rest.starts_with(AUTOSNAP_TAG) {
        return Ok(None);
    }
    if dataset.is_empty() {
        return Err(MalformedName {
            name: raw_name.to_string(),
            reason: "empty dataset name".to_string(),
        });
    }

    let creation = raw_creation
        .trim()
        .parse::<i64>()
        .map_err(|e| MalformedName {
            name: raw_name.to_string(),
            reason: format!("can't parse creation date '{}': {}", raw_creation, e),
        })?;

    let label = match rest.rfind('.') {
        Some(pos) if pos + 1 < rest.len() => &rest[pos + 1..],
        _ => UNKNOWN_LABEL,
    };

    Ok(Some(SnapshotRecord {
        full_name: raw_name.to_string(),
        dataset: dataset.to_string(),
        label: label.to_string(),
        creation,
    }))
}
