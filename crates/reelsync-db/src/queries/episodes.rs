//! Season and episode queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reelsync_common::{
    EpisodeId, Error, ImageRef, ImageScope, Result, SeasonId, ShowId, TitleId,
    EPISODE_IMAGE_SENTINEL, TITLE_IMAGE_SENTINEL,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};

use super::batch::{self, Assign};
use super::titles::row_to_title;
use crate::models::{Episode, EpisodeEnrichment, EpisodeSnapshot, NewEpisode, Show};

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Map each show's catalog id to its show record.
pub fn load_show_ids(conn: &Connection) -> Result<HashMap<String, ShowId>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.imdb_id, s.id FROM shows s
             JOIN titles t ON t.id = s.title_id
             WHERE t.imdb_id IS NOT NULL",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, ShowId::from(row.get::<_, i64>(1)?)))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Map `(show, season number)` to the season record.
pub fn load_seasons(conn: &Connection) -> Result<HashMap<(ShowId, i64), SeasonId>> {
    let mut stmt = conn
        .prepare("SELECT show_id, season, id FROM show_seasons")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                (ShowId::from(row.get::<_, i64>(0)?), row.get::<_, i64>(1)?),
                SeasonId::from(row.get::<_, i64>(2)?),
            ))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Insert seasons and return the generated ids. Existing pairs are skipped.
pub fn insert_seasons(
    conn: &Connection,
    seasons: &[(ShowId, i64)],
) -> Result<Vec<((ShowId, i64), SeasonId)>> {
    let rows: Vec<Vec<Value>> = seasons
        .iter()
        .map(|(show, season)| vec![Value::Integer(show.get()), Value::Integer(*season)])
        .collect();

    batch::insert_returning(
        conn,
        "INSERT INTO show_seasons (show_id, season) VALUES",
        "ON CONFLICT(show_id, season) DO NOTHING RETURNING id, show_id, season",
        2,
        &rows,
        |row| {
            Ok((
                (ShowId::from(row.get::<_, i64>(1)?), row.get::<_, i64>(2)?),
                SeasonId::from(row.get::<_, i64>(0)?),
            ))
        },
    )
}

/// Map `(season, episode number)` to the stored episode.
pub fn load_episode_snapshot(
    conn: &Connection,
) -> Result<HashMap<(SeasonId, i64), EpisodeSnapshot>> {
    let mut stmt = conn
        .prepare("SELECT season_id, episode, id, display_name FROM show_episodes")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                (SeasonId::from(row.get::<_, i64>(0)?), row.get::<_, i64>(1)?),
                EpisodeSnapshot {
                    id: EpisodeId::from(row.get::<_, i64>(2)?),
                    display_name: row.get(3)?,
                },
            ))
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        .map_err(|e| Error::database(e.to_string()))
}

pub fn insert_episodes(conn: &Connection, episodes: &[NewEpisode]) -> Result<usize> {
    let rows: Vec<Vec<Value>> = episodes
        .iter()
        .map(|e| {
            vec![
                Value::Integer(e.season_id.get()),
                Value::Integer(e.episode),
                Value::Text(e.imdb_id.clone()),
                batch::text(&e.display_name),
            ]
        })
        .collect();

    batch::insert_many(
        conn,
        "INSERT INTO show_episodes (season_id, episode, imdb_id, display_name) VALUES",
        "ON CONFLICT(season_id, episode) DO NOTHING",
        4,
        &rows,
    )
}

/// Rename episodes. Only the display name is dataset-derived.
pub fn update_episode_names(
    conn: &Connection,
    updates: &[(EpisodeId, Option<String>)],
) -> Result<usize> {
    const ASSIGNS: &[Assign] = &[Assign { column: "display_name", keep_on_null: false }];

    let rows: Vec<(i64, Vec<Value>)> = updates
        .iter()
        .map(|(id, name)| (id.get(), vec![batch::text(name)]))
        .collect();

    batch::case_update(conn, "show_episodes", "id", ASSIGNS, "", &rows)
}

// ---------------------------------------------------------------------------
// Detail views and lazy fetch
// ---------------------------------------------------------------------------

pub fn get_show(conn: &Connection, id: ShowId) -> Result<Show> {
    conn.query_row(
        "SELECT t.id, t.imdb_id, t.tmdb_id, t.type, t.display_name, t.original_title,
                t.start_year, t.end_year, t.runtime_minutes, t.average_rating, t.num_votes,
                t.original_language, t.release_date, t.tmdb_popularity, t.origin_country,
                t.image_url, t.needs_backfill_tmdb, t.episodes_checked_at
         FROM shows s JOIN titles t ON t.id = s.title_id
         WHERE s.id = :id",
        rusqlite::named_params! { ":id": id.get() },
        |row| Ok(Show { id, title: row_to_title(row)? }),
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))?
    .ok_or_else(|| Error::not_found(format!("show {id}")))
}

pub fn show_id_for_title(conn: &Connection, title_id: TitleId) -> Result<Option<ShowId>> {
    conn.query_row(
        "SELECT id FROM shows WHERE title_id = :title_id",
        rusqlite::named_params! { ":title_id": title_id.get() },
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|id| id.map(ShowId::from))
    .map_err(|e| Error::database(e.to_string()))
}

/// Every episode of a show, ordered by season then episode number.
pub fn list_show_episodes(conn: &Connection, show_id: ShowId) -> Result<Vec<Episode>> {
    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.season_id, s.season, e.episode, e.imdb_id, e.display_name,
                    e.image_url, e.air_date, e.runtime_minutes, e.synopsis
             FROM show_episodes e
             JOIN show_seasons s ON s.id = e.season_id
             WHERE s.show_id = :show_id
             ORDER BY s.season, e.episode",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::named_params! { ":show_id": show_id.get() }, |row| {
            let image: Option<String> = row.get(6)?;
            Ok(Episode {
                id: EpisodeId::from(row.get::<_, i64>(0)?),
                season_id: SeasonId::from(row.get::<_, i64>(1)?),
                season: row.get(2)?,
                episode: row.get(3)?,
                imdb_id: row.get(4)?,
                display_name: row.get(5)?,
                image: ImageRef::from_column(image.as_deref()),
                air_date: row.get(7)?,
                runtime_minutes: row.get(8)?,
                synopsis: row.get(9)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Shows due for an episode sweep, most-voted first.
///
/// A show qualifies while any of its episodes has never been checked and its
/// last check is older than `checked_before`. Titles already known to be
/// missing from the detail API are left out.
pub fn shows_for_episode_sweep(
    conn: &Connection,
    checked_before: DateTime<Utc>,
    limit: Option<usize>,
) -> Result<Vec<ShowId>> {
    let mut stmt = conn
        .prepare(
            "SELECT s.id FROM shows s
             JOIN titles t ON t.id = s.title_id
             WHERE t.imdb_id IS NOT NULL AND t.imdb_id != ''
               AND NOT (t.tmdb_id IS NULL AND t.image_url = :title_sentinel)
               AND (t.episodes_checked_at IS NULL OR t.episodes_checked_at < :checked_before)
               AND EXISTS (
                   SELECT 1 FROM show_episodes e
                   JOIN show_seasons ss ON ss.id = e.season_id
                   WHERE ss.show_id = s.id AND (e.image_url IS NULL OR e.image_url = '')
               )
             ORDER BY t.num_votes DESC NULLS LAST, s.id
             LIMIT :limit",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    // SQLite treats a negative limit as none.
    let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
    let rows = stmt
        .query_map(
            rusqlite::named_params! {
                ":title_sentinel": TITLE_IMAGE_SENTINEL,
                ":checked_before": checked_before.to_rfc3339(),
                ":limit": limit,
            },
            |row| row.get::<_, i64>(0).map(ShowId::from),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))
}

/// Merge episode detail with the same fill-if-empty rules as titles.
pub fn apply_episode_enrichment(
    conn: &Connection,
    id: EpisodeId,
    e: &EpisodeEnrichment,
) -> Result<()> {
    let image = e.image.to_column(ImageScope::Episode);
    let image_is_real = matches!(e.image, ImageRef::Resolved(_));

    conn.execute(
        "UPDATE show_episodes SET
            image_url = CASE
                WHEN :image_url IS NULL THEN image_url
                WHEN image_url IS NULL OR image_url = '' THEN :image_url
                WHEN :image_is_real = 1 AND image_url IN (:title_sentinel, :episode_sentinel)
                    THEN :image_url
                ELSE image_url
            END,
            display_name = COALESCE(NULLIF(display_name, ''), :display_name),
            air_date = COALESCE(NULLIF(air_date, ''), :air_date),
            runtime_minutes = COALESCE(NULLIF(runtime_minutes, 0), :runtime_minutes),
            synopsis = COALESCE(NULLIF(synopsis, ''), :synopsis)
         WHERE id = :id",
        rusqlite::named_params! {
            ":id": id.get(),
            ":image_url": image,
            ":image_is_real": image_is_real,
            ":title_sentinel": TITLE_IMAGE_SENTINEL,
            ":episode_sentinel": EPISODE_IMAGE_SENTINEL,
            ":display_name": e.display_name,
            ":air_date": e.air_date,
            ":runtime_minutes": e.runtime_minutes,
            ":synopsis": e.synopsis,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTitle;
    use crate::pool::init_memory_pool;
    use crate::queries::titles::{ensure_subtypes, insert_titles};
    use reelsync_common::TitleKind;

    fn seed_show(conn: &Connection) -> ShowId {
        insert_titles(
            conn,
            &[NewTitle {
                imdb_id: "tt01".into(),
                kind: TitleKind::Show,
                display_name: "A Show".into(),
                original_title: None,
                start_year: Some(2020),
                end_year: None,
                runtime_minutes: None,
            }],
        )
        .unwrap();
        ensure_subtypes(conn).unwrap();
        load_show_ids(conn).unwrap()["tt01"]
    }

    #[test]
    fn test_seasons_insert_once() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let show = seed_show(&conn);

        let created = insert_seasons(&conn, &[(show, 1), (show, 2)]).unwrap();
        assert_eq!(created.len(), 2);
        assert!(insert_seasons(&conn, &[(show, 1)]).unwrap().is_empty());
        assert_eq!(load_seasons(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_episode_insert_update_and_list() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let show = seed_show(&conn);
        let seasons: HashMap<_, _> = insert_seasons(&conn, &[(show, 2), (show, 1)])
            .unwrap()
            .into_iter()
            .collect();

        let inserted = insert_episodes(
            &conn,
            &[
                NewEpisode {
                    season_id: seasons[&(show, 2)],
                    episode: 1,
                    imdb_id: "tt11".into(),
                    display_name: None,
                },
                NewEpisode {
                    season_id: seasons[&(show, 1)],
                    episode: 1,
                    imdb_id: "tt10".into(),
                    display_name: Some("Pilot".into()),
                },
            ],
        )
        .unwrap();
        assert_eq!(inserted, 2);

        let snapshot = load_episode_snapshot(&conn).unwrap();
        let target = snapshot[&(seasons[&(show, 2)], 1)].id;
        update_episode_names(&conn, &[(target, Some("Return".into()))]).unwrap();

        let episodes = list_show_episodes(&conn, show).unwrap();
        let order: Vec<_> = episodes.iter().map(|e| (e.season, e.episode)).collect();
        assert_eq!(order, vec![(1, 1), (2, 1)]);
        assert_eq!(episodes[1].display_name.as_deref(), Some("Return"));
    }

    #[test]
    fn test_episode_sentinel_then_resolved() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let show = seed_show(&conn);
        let season = insert_seasons(&conn, &[(show, 1)]).unwrap()[0].1;
        insert_episodes(
            &conn,
            &[NewEpisode { season_id: season, episode: 1, imdb_id: "tt10".into(), display_name: None }],
        )
        .unwrap();
        let id = list_show_episodes(&conn, show).unwrap()[0].id;

        apply_episode_enrichment(
            &conn,
            id,
            &EpisodeEnrichment { image: ImageRef::NotFound, ..Default::default() },
        )
        .unwrap();
        let raw: String = conn
            .query_row("SELECT image_url FROM show_episodes WHERE id = ?", [id.get()], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(raw, EPISODE_IMAGE_SENTINEL);

        apply_episode_enrichment(
            &conn,
            id,
            &EpisodeEnrichment {
                image: ImageRef::Resolved("https://img/still.jpg".into()),
                display_name: Some("Pilot".into()),
                air_date: Some("2020-01-01".into()),
                runtime_minutes: Some(44),
                synopsis: Some("Things happen.".into()),
            },
        )
        .unwrap();
        let episode = &list_show_episodes(&conn, show).unwrap()[0];
        assert_eq!(episode.image, ImageRef::Resolved("https://img/still.jpg".into()));
        assert_eq!(episode.display_name.as_deref(), Some("Pilot"));
        assert_eq!(episode.runtime_minutes, Some(44));
    }

    #[test]
    fn test_get_show_joins_title() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let show = seed_show(&conn);

        let loaded = get_show(&conn, show).unwrap();
        assert_eq!(loaded.title.display_name, "A Show");
        assert_eq!(show_id_for_title(&conn, loaded.title.id).unwrap(), Some(show));
        assert!(get_show(&conn, ShowId::from(999)).is_err());
    }

    #[test]
    fn test_sweep_selects_unchecked_episodes() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let show = seed_show(&conn);
        let season = insert_seasons(&conn, &[(show, 1)]).unwrap()[0].1;
        insert_episodes(
            &conn,
            &[NewEpisode { season_id: season, episode: 1, imdb_id: "tt10".into(), display_name: None }],
        )
        .unwrap();
        let now = Utc::now();
        assert_eq!(shows_for_episode_sweep(&conn, now, None).unwrap(), vec![show]);
        assert!(shows_for_episode_sweep(&conn, now, Some(0)).unwrap().is_empty());

        let title = get_show(&conn, show).unwrap().title.id;
        crate::queries::titles::touch_episodes_checked(&conn, title, now).unwrap();
        let cooling = now - chrono::TimeDelta::hours(1);
        assert!(shows_for_episode_sweep(&conn, cooling, None).unwrap().is_empty());
        let due = now + chrono::TimeDelta::hours(1);
        assert_eq!(shows_for_episode_sweep(&conn, due, None).unwrap(), vec![show]);

        let id = list_show_episodes(&conn, show).unwrap()[0].id;
        apply_episode_enrichment(
            &conn,
            id,
            &EpisodeEnrichment { image: ImageRef::NotFound, ..Default::default() },
        )
        .unwrap();
        assert!(shows_for_episode_sweep(&conn, due, None).unwrap().is_empty());
    }
}
