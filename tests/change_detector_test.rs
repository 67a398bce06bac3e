//! Integration tests for fingerprint-gated sync runs.

mod common;

use common::{dataset_config, file_pool, scalar, write_dataset};
use reelsync::config::Config;
use reelsync::sync::{run_sync, SyncOptions};

fn offline_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.dataset = dataset_config(dir);
    config.backfill.enabled = false;
    config
}

const LOCAL: SyncOptions = SyncOptions { force: false, skip_download: true };

#[tokio::test]
async fn unchanged_dataset_skips_import() {
    let (dir, pool) = file_pool();
    write_dataset(
        dir.path(),
        &["tt01\tmovie\tA Film\t\\N\t0\t2000\t\\N\t90\tDrama"],
        &[],
        &["tt01\t6.0\t10"],
    );
    let config = offline_config(dir.path());

    let first = run_sync(&config, pool.clone(), LOCAL).await.unwrap();
    assert_eq!(first.decision, "changed");
    assert_eq!(first.import.as_ref().map(|r| r.titles.inserted), Some(1));
    assert!(first.backfill.is_none());

    let second = run_sync(&config, pool.clone(), LOCAL).await.unwrap();
    assert_eq!(second.decision, "unchanged");
    assert_eq!(second.fingerprint, first.fingerprint);
    assert!(second.import.is_none());
}

#[tokio::test]
async fn changed_file_triggers_import() {
    let (dir, pool) = file_pool();
    let config = offline_config(dir.path());
    write_dataset(dir.path(), &["tt01\tmovie\tA Film\t\\N\t0\t2000\t\\N\t90\t\\N"], &[], &[]);
    let first = run_sync(&config, pool.clone(), LOCAL).await.unwrap();

    write_dataset(dir.path(), &["tt01\tmovie\tA Film\t\\N\t0\t2000\t\\N\t90\t\\N"], &[], &["tt01\t6.0\t10"]);
    let second = run_sync(&config, pool.clone(), LOCAL).await.unwrap();

    assert_ne!(second.fingerprint, first.fingerprint);
    assert_eq!(second.decision, "changed");
    let import = second.import.unwrap();
    assert_eq!(import.titles.unchanged, 1);
    assert_eq!(import.ratings.updated, 1);
}

#[tokio::test]
async fn forced_import_of_same_data_writes_nothing() {
    let (dir, pool) = file_pool();
    write_dataset(dir.path(), &["tt01\ttvSeries\tA Show\t\\N\t0\t2000\t\\N\t30\tComedy"], &[], &[]);
    let config = offline_config(dir.path());
    run_sync(&config, pool.clone(), LOCAL).await.unwrap();

    let forced = run_sync(&config, pool.clone(), SyncOptions { force: true, skip_download: true })
        .await
        .unwrap();
    assert_eq!(forced.decision, "forced");
    assert_eq!(forced.import.unwrap().totals().writes(), 0);
    assert_eq!(scalar::<i64>(&pool, "SELECT COUNT(*) FROM titles"), 1);
}

#[tokio::test]
async fn missing_local_files_fail_before_import() {
    let (dir, pool) = file_pool();
    let config = offline_config(dir.path());

    let err = run_sync(&config, pool.clone(), LOCAL).await.unwrap_err();
    assert!(err.to_string().contains("missing"));
    assert_eq!(
        scalar::<i64>(&pool, "SELECT COUNT(*) FROM sync_state"),
        0
    );
}
