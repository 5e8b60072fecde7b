use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AnimeverseError;

const SCHEMA_V1: &str = include_str!("../../../migrations/001_image_cache.sql");

/// SQLite-backed store of resolved cover/banner pairs.
pub struct Storage {
    conn: Connection,
}

/// A persisted image pair for one catalog entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredImages {
    pub id: i64,
    pub mal_id: Option<u64>,
    pub anilist_id: Option<u64>,
    pub image_url: String,
    pub banner_url: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl StoredImages {
    /// Whether the row was last written more than `max_age` before `now`.
    pub fn is_stale(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.last_updated > max_age
    }
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, AnimeverseError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, AnimeverseError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Find the most recently updated row matching every present ID.
    ///
    /// A lookup by MAL ID alone matches rows saved with any AniList ID, and
    /// vice versa.
    pub fn get_images(
        &self,
        mal_id: Option<u64>,
        anilist_id: Option<u64>,
    ) -> Result<Option<StoredImages>, AnimeverseError> {
        require_some_id(mal_id, anilist_id)?;
        self.conn
            .query_row(
                "SELECT id, mal_id, anilist_id, image_url, banner_url, created_at, last_updated
                 FROM image_cache
                 WHERE (?1 IS NULL OR mal_id = ?1) AND (?2 IS NULL OR anilist_id = ?2)
                 ORDER BY last_updated DESC, id DESC
                 LIMIT 1",
                params![mal_id.map(|v| v as i64), anilist_id.map(|v| v as i64)],
                |row| Ok(row_to_images(row)),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or update the image pair for an entry, stamped with the current time.
    pub fn upsert_images(
        &self,
        mal_id: Option<u64>,
        anilist_id: Option<u64>,
        image_url: &str,
        banner_url: &str,
    ) -> Result<i64, AnimeverseError> {
        self.upsert_images_at(mal_id, anilist_id, image_url, banner_url, Utc::now())
    }

    /// Insert or update the image pair for an entry.
    ///
    /// The existing row is located with the same matching rules as
    /// [`Storage::get_images`]. On update the URLs and `last_updated` are
    /// replaced and `created_at` is kept. Returns the row ID.
    pub fn upsert_images_at(
        &self,
        mal_id: Option<u64>,
        anilist_id: Option<u64>,
        image_url: &str,
        banner_url: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, AnimeverseError> {
        let stamp = now.to_rfc3339();

        if let Some(existing) = self.get_images(mal_id, anilist_id)? {
            self.conn.execute(
                "UPDATE image_cache SET
                    mal_id = COALESCE(?1, mal_id),
                    anilist_id = COALESCE(?2, anilist_id),
                    image_url = ?3, banner_url = ?4, last_updated = ?5
                 WHERE id = ?6",
                params![
                    mal_id.map(|v| v as i64),
                    anilist_id.map(|v| v as i64),
                    image_url,
                    banner_url,
                    stamp,
                    existing.id,
                ],
            )?;
            tracing::debug!(id = existing.id, ?mal_id, ?anilist_id, "Updated stored images");
            return Ok(existing.id);
        }

        self.conn.execute(
            "INSERT INTO image_cache (mal_id, anilist_id, image_url, banner_url,
                                      created_at, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                mal_id.map(|v| v as i64),
                anilist_id.map(|v| v as i64),
                image_url,
                banner_url,
                stamp,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, ?mal_id, ?anilist_id, "Inserted stored images");
        Ok(id)
    }

    /// Delete rows last updated before `cutoff`. Returns the number removed.
    pub fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, AnimeverseError> {
        // RFC 3339 stamps written by this module share one offset, so they
        // order lexically.
        let removed = self.conn.execute(
            "DELETE FROM image_cache WHERE last_updated < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }

    /// Number of stored rows.
    pub fn count(&self) -> Result<usize, AnimeverseError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM image_cache", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn require_some_id(mal_id: Option<u64>, anilist_id: Option<u64>) -> Result<(), AnimeverseError> {
    if mal_id.is_none() && anilist_id.is_none() {
        return Err(AnimeverseError::InvalidLookup(
            "at least one of mal_id or anilist_id is required".into(),
        ));
    }
    Ok(())
}

fn run_migrations(conn: &Connection) -> Result<(), AnimeverseError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_images(row: &rusqlite::Row<'_>) -> StoredImages {
    let created_at: String = row.get(5).unwrap_or_default();
    let last_updated: String = row.get(6).unwrap_or_default();
    StoredImages {
        id: row.get(0).unwrap_or(0),
        mal_id: row.get::<_, Option<i64>>(1).ok().flatten().map(|v| v as u64),
        anilist_id: row.get::<_, Option<i64>>(2).ok().flatten().map(|v| v as u64),
        image_url: row.get(3).unwrap_or_default(),
        banner_url: row.get(4).unwrap_or_default(),
        created_at: parse_datetime(&created_at),
        last_updated: parse_datetime(&last_updated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const COVER: &str = "https://cdn.myanimelist.net/images/anime/1015/138006l.jpg";
    const BANNER: &str = "https://s4.anilist.co/file/anilistcdn/media/anime/banner/154587.jpg";

    #[test]
    fn test_insert_and_get_images() {
        let db = Storage::open_memory().unwrap();
        let id = db
            .upsert_images(Some(52991), Some(154587), COVER, BANNER)
            .unwrap();
        assert!(id > 0);

        let row = db.get_images(Some(52991), Some(154587)).unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.mal_id, Some(52991));
        assert_eq!(row.anilist_id, Some(154587));
        assert_eq!(row.image_url, COVER);
        assert_eq!(row.banner_url, BANNER);
    }

    #[test]
    fn test_get_images_missing() {
        let db = Storage::open_memory().unwrap();
        assert!(db.get_images(Some(1), None).unwrap().is_none());
    }

    #[test]
    fn test_lookup_by_single_id_matches() {
        let db = Storage::open_memory().unwrap();
        db.upsert_images(Some(52991), Some(154587), COVER, BANNER)
            .unwrap();

        assert!(db.get_images(Some(52991), None).unwrap().is_some());
        assert!(db.get_images(None, Some(154587)).unwrap().is_some());
        assert!(db.get_images(Some(52991), Some(1)).unwrap().is_none());
    }

    #[test]
    fn test_lookup_requires_an_id() {
        let db = Storage::open_memory().unwrap();
        let err = db.get_images(None, None).unwrap_err();
        assert!(matches!(err, AnimeverseError::InvalidLookup(_)));
        assert!(db.upsert_images(None, None, COVER, "").is_err());
    }

    #[test]
    fn test_upsert_keeps_created_at() {
        let db = Storage::open_memory().unwrap();
        let first = Utc::now() - Duration::days(3);
        let second = Utc::now();

        let id = db
            .upsert_images_at(Some(52991), Some(154587), COVER, "", first)
            .unwrap();
        let same = db
            .upsert_images_at(Some(52991), Some(154587), COVER, BANNER, second)
            .unwrap();
        assert_eq!(id, same);
        assert_eq!(db.count().unwrap(), 1);

        let row = db.get_images(Some(52991), None).unwrap().unwrap();
        assert_eq!(row.banner_url, BANNER);
        assert_eq!(row.created_at.timestamp(), first.timestamp());
        assert_eq!(row.last_updated.timestamp(), second.timestamp());
    }

    #[test]
    fn test_partial_upsert_keeps_other_id() {
        let db = Storage::open_memory().unwrap();
        let id = db
            .upsert_images(Some(52991), Some(154587), COVER, BANNER)
            .unwrap();
        let same = db.upsert_images(Some(52991), None, COVER, "").unwrap();
        assert_eq!(id, same);

        let row = db.get_images(None, Some(154587)).unwrap().unwrap();
        assert_eq!(row.mal_id, Some(52991));
        assert_eq!(row.banner_url, "");
    }

    #[test]
    fn test_different_pair_inserts_new_row() {
        let db = Storage::open_memory().unwrap();
        db.upsert_images(Some(52991), None, COVER, "").unwrap();
        db.upsert_images(Some(52991), Some(154587), COVER, BANNER)
            .unwrap();
        assert_eq!(db.count().unwrap(), 2);
    }

    #[test]
    fn test_is_stale() {
        let db = Storage::open_memory().unwrap();
        let written = Utc::now() - Duration::days(31);
        db.upsert_images_at(Some(5114), None, COVER, "", written)
            .unwrap();
        let row = db.get_images(Some(5114), None).unwrap().unwrap();

        assert!(row.is_stale(Duration::days(30), Utc::now()));
        assert!(!row.is_stale(Duration::days(60), Utc::now()));
    }

    #[test]
    fn test_delete_stale() {
        let db = Storage::open_memory().unwrap();
        let now = Utc::now();
        db.upsert_images_at(Some(1), None, COVER, "", now - Duration::days(40))
            .unwrap();
        db.upsert_images_at(Some(2), None, COVER, "", now).unwrap();

        let removed = db.delete_stale(now - Duration::days(30)).unwrap();
        assert_eq!(removed, 1);
        assert!(db.get_images(Some(1), None).unwrap().is_none());
        assert!(db.get_images(Some(2), None).unwrap().is_some());
    }

    #[test]
    fn test_open_on_disk_reopens_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animeverse.db");
        {
            let db = Storage::open(&path).unwrap();
            db.upsert_images(None, Some(21), "", BANNER).unwrap();
        }
        let db = Storage::open(&path).unwrap();
        let row = db.get_images(None, Some(21)).unwrap().unwrap();
        assert_eq!(row.banner_url, BANNER);
        assert!(row.mal_id.is_none());
    }
}
