//! Integration tests for the enrichment backlog drain.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{exec, file_pool, scalar, FakeSource};
use reelsync::backfill::BackfillScheduler;
use reelsync::config::BackfillConfig;
use reelsync::enrich::ImageUrls;
use reelsync::tmdb::{ApiError, FindCandidate, FindResult, TitleDetail};
use reelsync_common::TitleKind;
use reelsync_db::pool::DbPool;

fn scheduler(pool: &DbPool, source: Arc<FakeSource>, config: BackfillConfig) -> BackfillScheduler {
    BackfillScheduler::new(pool.clone(), source, ImageUrls::new("https://img"), &config)
        .with_cooldown(Duration::ZERO)
}

fn serial_config() -> BackfillConfig {
    BackfillConfig {
        workers: 1,
        max_stalled_pages: 1,
        ..BackfillConfig::default()
    }
}

fn movie_found(tmdb_id: i64) -> FindResult {
    FindResult {
        movie_results: vec![FindCandidate { id: tmdb_id, ..Default::default() }],
        tv_results: vec![],
    }
}

fn flag(pool: &DbPool, imdb_id: &str) -> i64 {
    scalar(pool, &format!("SELECT needs_backfill_tmdb FROM titles WHERE imdb_id = '{imdb_id}'"))
}

#[tokio::test]
async fn resolves_and_merges_detail() {
    let (_dir, pool) = file_pool();
    exec(&pool, "INSERT INTO titles (imdb_id, type, display_name, num_votes) VALUES ('tt1', 'movie', 'Film', 10)");

    let detail = TitleDetail {
        poster_path: Some("/p.jpg".into()),
        original_language: Some("en".into()),
        release_date: Some("1999-03-31".into()),
        popularity: Some(12.5),
        origin_country: vec!["US".into()],
        runtime: Some(136),
        ..Default::default()
    };
    let source = Arc::new(
        FakeSource::new()
            .with_find("tt1", Ok(movie_found(603)))
            .with_detail(TitleKind::Movie, 603, Ok(detail)),
    );

    let report = scheduler(&pool, source, serial_config()).drain(10).await.unwrap();

    assert_eq!(report.enriched, 1);
    assert_eq!(report.pages, 1);
    assert_eq!(flag(&pool, "tt1"), 0);
    assert_eq!(scalar::<i64>(&pool, "SELECT tmdb_id FROM titles WHERE imdb_id = 'tt1'"), 603);
    assert_eq!(
        scalar::<String>(&pool, "SELECT image_url FROM titles WHERE imdb_id = 'tt1'"),
        "https://img/w500/p.jpg"
    );
    assert_eq!(scalar::<i64>(&pool, "SELECT runtime_minutes FROM titles WHERE imdb_id = 'tt1'"), 136);
    assert_eq!(scalar::<String>(&pool, "SELECT origin_country FROM titles WHERE imdb_id = 'tt1'"), "US");
}

#[tokio::test]
async fn throttled_rows_stay_flagged() {
    let (_dir, pool) = file_pool();
    exec(&pool, "INSERT INTO titles (imdb_id, type, display_name) VALUES ('tt1', 'movie', 'Film')");
    let source = Arc::new(FakeSource::new().with_find(
        "tt1",
        Err(ApiError::Throttled { retry_after: Some(Duration::from_secs(1)) }),
    ));

    let report = scheduler(&pool, source, serial_config()).drain(10).await.unwrap();

    assert!(report.stalled);
    assert_eq!(report.throttled, 1);
    assert_eq!(flag(&pool, "tt1"), 1);
}

#[tokio::test]
async fn missing_catalog_id_clears_without_calls() {
    let (_dir, pool) = file_pool();
    exec(&pool, "INSERT INTO titles (imdb_id, type, display_name) VALUES (NULL, 'movie', 'Orphan')");
    let source = Arc::new(FakeSource::new());

    let report = scheduler(&pool, Arc::clone(&source), serial_config()).drain(10).await.unwrap();

    assert_eq!(report.cleared_unresolvable, 1);
    assert_eq!(source.total_calls(), 0);
    assert_eq!(scalar::<i64>(&pool, "SELECT COUNT(*) FROM titles WHERE needs_backfill_tmdb = 1"), 0);
}

#[tokio::test]
async fn empty_lookup_clears_flag() {
    let (_dir, pool) = file_pool();
    exec(&pool, "INSERT INTO titles (imdb_id, type, display_name) VALUES ('tt1', 'show', 'Show')");
    let source = Arc::new(FakeSource::new().with_find("tt1", Ok(FindResult::default())));

    let report = scheduler(&pool, Arc::clone(&source), serial_config()).drain(10).await.unwrap();

    assert_eq!(report.cleared_unresolvable, 1);
    assert_eq!(source.detail_calls.load(Ordering::SeqCst), 0);
    assert_eq!(flag(&pool, "tt1"), 0);
}

#[tokio::test]
async fn server_error_clears_flag() {
    let (_dir, pool) = file_pool();
    exec(&pool, "INSERT INTO titles (imdb_id, type, display_name) VALUES ('tt1', 'movie', 'Film')");
    let source = Arc::new(FakeSource::new().with_find("tt1", Err(ApiError::Status(500))));

    let report = scheduler(&pool, source, serial_config()).drain(10).await.unwrap();

    assert_eq!(report.cleared_failed, 1);
    assert!(!report.stalled);
    assert_eq!(flag(&pool, "tt1"), 0);
}

#[tokio::test]
async fn stored_values_are_not_overwritten() {
    let (_dir, pool) = file_pool();
    exec(
        &pool,
        "INSERT INTO titles (imdb_id, tmdb_id, type, display_name, origin_country, runtime_minutes)
         VALUES ('tt1', 77, 'movie', 'Film', 'fr', 0)",
    );
    let detail = TitleDetail {
        origin_country: vec!["US".into()],
        original_language: Some("fr".into()),
        runtime: Some(95),
        ..Default::default()
    };
    let source = Arc::new(FakeSource::new().with_detail(TitleKind::Movie, 77, Ok(detail)));

    scheduler(&pool, Arc::clone(&source), serial_config()).drain(10).await.unwrap();

    // A known secondary id skips the lookup.
    assert_eq!(source.find_calls.load(Ordering::SeqCst), 0);
    assert_eq!(scalar::<String>(&pool, "SELECT origin_country FROM titles"), "fr");
    assert_eq!(scalar::<String>(&pool, "SELECT original_language FROM titles"), "fr");
    // Zero counts as empty.
    assert_eq!(scalar::<i64>(&pool, "SELECT runtime_minutes FROM titles"), 95);
    // No poster in the detail record: negative sentinel.
    assert_eq!(scalar::<String>(&pool, "SELECT image_url FROM titles"), "none");
}

#[tokio::test]
async fn detail_uses_kind_of_matched_candidate() {
    let (_dir, pool) = file_pool();
    exec(&pool, "INSERT INTO titles (imdb_id, type, display_name) VALUES ('tt1', 'show', 'Listed As Show')");
    let source = Arc::new(
        FakeSource::new()
            .with_find("tt1", Ok(movie_found(42)))
            .with_detail(TitleKind::Movie, 42, Ok(TitleDetail::default())),
    );

    let report = scheduler(&pool, Arc::clone(&source), serial_config()).drain(10).await.unwrap();

    assert_eq!(report.enriched, 1);
    assert_eq!(*source.detail_log.lock().unwrap(), vec![(TitleKind::Movie, 42)]);
    // Kind is fixed at creation.
    assert_eq!(scalar::<String>(&pool, "SELECT type FROM titles"), "show");
}

#[tokio::test]
async fn most_voted_rows_go_first() {
    let (_dir, pool) = file_pool();
    exec(
        &pool,
        "INSERT INTO titles (imdb_id, type, display_name, num_votes) VALUES
            ('tt_low', 'movie', 'Low', 10),
            ('tt_none', 'movie', 'Unrated', NULL),
            ('tt_high', 'movie', 'High', 1000),
            ('tt_mid', 'movie', 'Mid', 100)",
    );
    let source = Arc::new(FakeSource::new());

    let report = scheduler(&pool, Arc::clone(&source), serial_config()).drain(1).await.unwrap();

    assert_eq!(report.pages, 4);
    assert_eq!(
        *source.find_log.lock().unwrap(),
        vec!["tt_high", "tt_mid", "tt_low", "tt_none"]
    );
}
