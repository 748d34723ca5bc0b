// Полный цикл ротации на MemoryStore: создание, инвентаризация, удаление,
// частичные отказы и фатальные ошибки инвентаризации.

use std::collections::BTreeSet;

use anyhow::Result;

use autosnap::store::Mutation;
use autosnap::{execute, parse_policy, Command, MemoryStore, Policy, RotateOptions};

const DAY: i64 = 86_400;

fn policy() -> Result<Policy> {
    Ok(parse_policy(
        "interval daily 2\n\
         interval hourly 3\n\
         exclude tank/scratch*\n",
    )?)
}

fn names(v: &[String]) -> BTreeSet<&str> {
    v.iter().map(String::as_str).collect()
}

#[test]
fn clean_run_only_prunes() -> Result<()> {
    let store = MemoryStore::new()
        .with_dataset("tank")
        .with_snapshot("tank@autosnap.2020-01-01.00:00:00.daily", 1)
        .with_snapshot("tank@autosnap.2020-01-02.00:00:00.daily", 2)
        .with_snapshot("tank@autosnap.2020-01-03.00:00:00.daily", 3)
        .with_snapshot("tank@autosnap.2020-01-01.00:00:00.weekly", 4);

    let report = execute(&policy()?, &Command::Clean, &store, &RotateOptions::default())?;

    assert!(report.created.is_empty());
    assert_eq!(report.datasets_included, 0);
    assert_eq!(
        names(&report.destroyed),
        BTreeSet::from([
            "tank@autosnap.2020-01-01.00:00:00.daily",
            "tank@autosnap.2020-01-01.00:00:00.weekly",
        ])
    );
    assert_eq!(
        store.snapshot_names(),
        BTreeSet::from([
            "tank@autosnap.2020-01-02.00:00:00.daily".to_string(),
            "tank@autosnap.2020-01-03.00:00:00.daily".to_string(),
        ])
    );
    Ok(())
}

#[test]
fn orphan_is_deleted_even_when_alone() -> Result<()> {
    let store =
        MemoryStore::new().with_snapshot("tank/x@autosnap.2020-01-01.00:00:00.weekly", 1_577_836_800);
    let report = execute(&policy()?, &Command::Clean, &store, &RotateOptions::default())?;
    assert_eq!(report.destroyed, vec!["tank/x@autosnap.2020-01-01.00:00:00.weekly"]);
    assert!(store.snapshot_names().is_empty());
    Ok(())
}

#[test]
fn foreign_and_malformed_are_left_alone() -> Result<()> {
    let store = MemoryStore::new()
        .with_snapshot("tank@manual-before-upgrade", 1)
        .with_snapshot("tank@zfs-auto-snap_daily-2020", 2);
    store.add_raw_snapshot("tank@autosnap.2020-01-01.00:00:00.weekly", "-");

    let report = execute(&policy()?, &Command::Clean, &store, &RotateOptions::default())?;

    assert_eq!(report.foreign_skipped, 2);
    assert_eq!(report.malformed, vec!["tank@autosnap.2020-01-01.00:00:00.weekly"]);
    assert_eq!(report.snapshots_seen, 0);
    assert!(report.destroyed.is_empty());
    assert_eq!(store.snapshot_names().len(), 3);
    Ok(())
}

#[test]
fn repeated_daily_runs_keep_window() -> Result<()> {
    let store = MemoryStore::new()
        .with_dataset("tank")
        .with_dataset("tank/home")
        .with_dataset("tank/scratch");
    let p = policy()?;
    let cmd = p.command("daily")?;

    for day in 0..5 {
        store.set_now(1_600_000_000 + day * DAY);
        let report = execute(&p, &cmd, &store, &RotateOptions::default())?;
        assert!(report.is_clean());
        assert_eq!(report.created.len(), 2);
    }

    let left = store.snapshot_names();
    assert_eq!(left.len(), 4, "{left:?}");
    for ds in ["tank", "tank/home"] {
        let mine: Vec<&String> = left
            .iter()
            .filter(|n| n.split_once('@').map(|(d, _)| d) == Some(ds))
            .collect();
        assert_eq!(mine.len(), 2, "{ds}: {left:?}");
    }
    // the excluded dataset never got one
    assert!(left.iter().all(|n| !n.starts_with("tank/scratch@")));
    Ok(())
}

#[test]
fn intervals_do_not_prune_each_other() -> Result<()> {
    let store = MemoryStore::new().with_dataset("tank");
    let p = policy()?;
    let daily = p.command("daily")?;
    let hourly = p.command("hourly")?;

    let mut t = 1_600_000_000;
    for _ in 0..4 {
        store.set_now(t);
        execute(&p, &hourly, &store, &RotateOptions::default())?;
        t += 3600;
    }
    store.set_now(t);
    execute(&p, &daily, &store, &RotateOptions::default())?;

    let left = store.snapshot_names();
    assert_eq!(left.iter().filter(|n| n.ends_with(".hourly")).count(), 3);
    assert_eq!(left.iter().filter(|n| n.ends_with(".daily")).count(), 1);
    Ok(())
}

#[test]
fn create_failure_does_not_stop_the_cycle() -> Result<()> {
    let store = MemoryStore::new()
        .with_dataset("a")
        .with_dataset("b")
        .with_dataset("c")
        .with_snapshot("c@autosnap.old.weekly", 1);
    store.fail_create("b");
    store.set_now(1_000);

    let report = execute(&policy()?, &Command::Interval("daily".into()), &store, &RotateOptions::default())?;

    assert_eq!(report.create_failed, vec!["b"]);
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.destroyed, vec!["c@autosnap.old.weekly"]);
    assert!(!report.is_clean());
    Ok(())
}

#[test]
fn destroy_failure_does_not_stop_the_cycle() -> Result<()> {
    let store = MemoryStore::new()
        .with_snapshot("a@autosnap.x.gone", 1)
        .with_snapshot("b@autosnap.x.gone", 1)
        .with_snapshot("c@autosnap.x.gone", 1);
    store.fail_destroy("b@autosnap.x.gone");

    let report = execute(&policy()?, &Command::Clean, &store, &RotateOptions::default())?;

    assert_eq!(report.destroy_failed, vec!["b@autosnap.x.gone"]);
    assert_eq!(
        names(&report.destroyed),
        BTreeSet::from(["a@autosnap.x.gone", "c@autosnap.x.gone"])
    );
    assert_eq!(
        store.snapshot_names(),
        BTreeSet::from(["b@autosnap.x.gone".to_string()])
    );
    Ok(())
}

#[test]
fn dataset_listing_failure_is_fatal_before_any_mutation() -> Result<()> {
    let store = MemoryStore::new()
        .with_dataset("tank")
        .with_snapshot("tank@autosnap.x.weekly", 1);
    store.fail_dataset_listing();

    let err = execute(&policy()?, &Command::Interval("daily".into()), &store, &RotateOptions::default())
        .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("datasets"), "{err}");
    assert!(store.journal().is_empty());
    Ok(())
}

#[test]
fn clean_does_not_need_dataset_listing() -> Result<()> {
    let store = MemoryStore::new().with_snapshot("tank@autosnap.x.weekly", 1);
    store.fail_dataset_listing();
    let report = execute(&policy()?, &Command::Clean, &store, &RotateOptions::default())?;
    assert_eq!(report.destroyed.len(), 1);
    Ok(())
}

#[test]
fn snapshot_listing_failure_blocks_deletion() -> Result<()> {
    let store = MemoryStore::new()
        .with_dataset("tank")
        .with_snapshot("tank@autosnap.x.weekly", 1);
    store.fail_snapshot_listing();
    store.set_now(5);

    let err = execute(&policy()?, &Command::Interval("daily".into()), &store, &RotateOptions::default())
        .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("snapshots"), "{err}");
    // the create pass already ran; nothing was destroyed
    let journal = store.journal();
    assert_eq!(journal.len(), 1);
    assert!(matches!(&journal[0], Mutation::Created(_)));
    Ok(())
}

#[test]
fn dry_run_reports_without_mutating() -> Result<()> {
    let store = MemoryStore::new()
        .with_dataset("tank")
        .with_snapshot("tank@autosnap.x.weekly", 1);
    let opts = RotateOptions { dry_run: true };

    let report = execute(&policy()?, &Command::Interval("daily".into()), &store, &opts)?;

    assert!(report.dry_run);
    assert_eq!(report.created.len(), 1);
    assert!(report.created[0].starts_with("tank@autosnap."));
    assert!(report.created[0].ends_with(".daily"));
    assert_eq!(report.destroyed, vec!["tank@autosnap.x.weekly"]);
    assert!(store.journal().is_empty());
    assert_eq!(store.snapshot_names().len(), 1);
    Ok(())
}

#[test]
fn dry_run_predicts_the_real_run() -> Result<()> {
    // bucket already at its retain count: the new snapshot pushes the oldest out
    let seeded = || {
        let store = MemoryStore::new()
            .with_dataset("tank")
            .with_snapshot("tank@autosnap.2020-09-01.00:00:00.daily", 1_598_918_400)
            .with_snapshot("tank@autosnap.2020-09-02.00:00:00.daily", 1_598_918_400 + DAY);
        store.set_now(1_598_918_400 + 2 * DAY);
        store
    };
    let cmd = Command::Interval("daily".into());

    let dry_store = seeded();
    let dry = execute(&policy()?, &cmd, &dry_store, &RotateOptions { dry_run: true })?;
    let real = execute(&policy()?, &cmd, &seeded(), &RotateOptions::default())?;

    assert_eq!(dry.created, vec!["tank@autosnap.2020-09-03.00:00:00.daily"]);
    assert_eq!(dry.created, real.created);
    assert_eq!(dry.destroyed, vec!["tank@autosnap.2020-09-01.00:00:00.daily"]);
    assert_eq!(dry.destroyed, real.destroyed);
    assert_eq!(dry.snapshots_seen, 2);
    assert!(dry_store.journal().is_empty());
    Ok(())
}

#[test]
fn report_serializes_to_json() -> Result<()> {
    let store = MemoryStore::new().with_snapshot("tank@autosnap.x.weekly", 1);
    let report = execute(&policy()?, &Command::Clean, &store, &RotateOptions::default())?;
    let v: serde_json::Value = serde_json::to_value(&report)?;
    assert_eq!(v["command"], "clean");
    assert_eq!(v["destroyed"][0], "tank@autosnap.x.weekly");
    assert_eq!(v["dry_run"], false);
    Ok(())
}
