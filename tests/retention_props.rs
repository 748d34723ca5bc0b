// Рандомизированные проверки retention (фиксированные seed'ы, oorandom):
// - удаляется ровно max(0, N - k) на (interval, dataset), выживают k самых свежих;
// - всё из "clean" удаляется всегда;
// - результат не зависит от порядка входа и повторного вызова.

use std::collections::{BTreeSet, HashMap};

use oorandom::Rand64;

use autosnap::retention::newest_first;
use autosnap::{apply_retention, build_catalog, Policy, SnapshotRecord};

const DATASETS: [&str; 4] = ["tank", "tank/home", "tank/home/alice", "pool/vm-1"];
const LABELS: [&str; 4] = ["hourly", "daily", "weekly", "unknown"];

fn random_policy(rng: &mut Rand64) -> Policy {
    // weekly/unknown are never declared -> "clean"
    Policy::builder()
        .interval("hourly", 1 + rng.rand_range(0..6) as i64)
        .interval("daily", 1 + rng.rand_range(0..4) as i64)
        .build()
        .expect("valid policy")
}

fn random_records(rng: &mut Rand64, n: usize) -> Vec<SnapshotRecord> {
    (0..n)
        .map(|i| {
            let dataset = DATASETS[rng.rand_range(0..DATASETS.len() as u64) as usize];
            let label = LABELS[rng.rand_range(0..LABELS.len() as u64) as usize];
            // narrow range -> plenty of creation-time ties
            let creation = rng.rand_range(0..40) as i64;
            SnapshotRecord {
                full_name: format!("{dataset}@autosnap.{i:05}.{label}"),
                dataset: dataset.to_string(),
                label: label.to_string(),
                creation,
            }
        })
        .collect()
}

fn shuffle(rng: &mut Rand64, v: &mut [SnapshotRecord]) {
    for i in (1..v.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        v.swap(i, j);
    }
}

#[test]
fn deletion_counts_and_survivors() {
    for seed in 0..64u128 {
        let mut rng = Rand64::new(0xA070_5EA9 + seed);
        let policy = random_policy(&mut rng);
        let n = rng.rand_range(0..120) as usize;
        let records = random_records(&mut rng, n);

        let catalog = build_catalog(&policy, records.clone());
        let doomed = apply_retention(&policy, &catalog);

        let mut groups: HashMap<(String, String), Vec<SnapshotRecord>> = HashMap::new();
        for r in &records {
            groups
                .entry((r.label.clone(), r.dataset.clone()))
                .or_default()
                .push(r.clone());
        }

        for ((label, dataset), mut group) in groups {
            let deleted: Vec<&SnapshotRecord> =
                group.iter().filter(|r| doomed.contains(*r)).collect();
            match policy.retain_count(&label) {
                None => assert_eq!(
                    deleted.len(),
                    group.len(),
                    "seed {seed}: clean bucket {label}/{dataset} must be fully pruned"
                ),
                Some(k) => {
                    let k = k.get() as usize;
                    assert_eq!(
                        deleted.len(),
                        group.len().saturating_sub(k),
                        "seed {seed}: {label}/{dataset}"
                    );
                    group.sort_by(newest_first);
                    for (i, r) in group.iter().enumerate() {
                        assert_eq!(
                            doomed.contains(r),
                            i >= k,
                            "seed {seed}: {label}/{dataset} position {i}"
                        );
                    }
                }
            }
        }

        // nothing outside the input is ever deleted
        let input: BTreeSet<&SnapshotRecord> = records.iter().collect();
        assert!(doomed.iter().all(|r| input.contains(r)));
    }
}

#[test]
fn order_independent_and_idempotent() {
    for seed in 0..32u128 {
        let mut rng = Rand64::new(0xC0FFEE + seed);
        let policy = random_policy(&mut rng);
        let mut records = random_records(&mut rng, 80);

        let catalog = build_catalog(&policy, records.clone());
        let first = apply_retention(&policy, &catalog);
        let again = apply_retention(&policy, &catalog);
        assert_eq!(first, again, "seed {seed}: repeated call differs");

        shuffle(&mut rng, &mut records);
        let shuffled = apply_retention(&policy, &build_catalog(&policy, records));
        assert_eq!(first, shuffled, "seed {seed}: input order leaked into result");
    }
}

#[test]
fn three_dailies_keep_two_newest() {
    let policy = Policy::builder().interval("daily", 2).build().expect("policy");
    let records: Vec<SnapshotRecord> = [100, 200, 150]
        .into_iter()
        .map(|c| SnapshotRecord {
            full_name: format!("tank/data@autosnap.{c}.daily"),
            dataset: "tank/data".to_string(),
            label: "daily".to_string(),
            creation: c,
        })
        .collect();
    let doomed = apply_retention(&policy, &build_catalog(&policy, records));
    let gone: BTreeSet<i64> = doomed.iter().map(|r| r.creation).collect();
    assert_eq!(gone, BTreeSet::from([100]));
}
