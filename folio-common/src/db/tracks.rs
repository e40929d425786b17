//! Music recordings

use super::{next_sort_order, non_blank, parse_uuid, required, reorder, OrderedTable};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Track record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Public URL of the audio file
    pub audio_url: String,
    pub cover_url: Option<String>,
    pub duration_ms: Option<i64>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            audio_url: audio_url.into(),
            cover_url: None,
            duration_ms: None,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    fn validated(&self) -> Result<Self> {
        let mut track = self.clone();
        track.title = required("Title", &self.title)?;
        track.audio_url = required("Audio URL", &self.audio_url)?;
        track.description = non_blank(self.description.clone());
        track.cover_url = non_blank(self.cover_url.clone());
        if matches!(track.duration_ms, Some(ms) if ms < 0) {
            return Err(Error::InvalidInput("Duration cannot be negative".to_string()));
        }
        Ok(track)
    }
}

/// Insert a track at the end of the list
///
/// Returns the stored record (trimmed fields, assigned sort order).
pub async fn insert_track(pool: &SqlitePool, track: &Track) -> Result<Track> {
    let mut track = track.validated()?;
    track.sort_order = next_sort_order(pool, OrderedTable::Tracks).await?;

    sqlx::query(
        r#"
        INSERT INTO tracks (
            id, title, description, audio_url, cover_url, duration_ms, sort_order, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.id.to_string())
    .bind(&track.title)
    .bind(&track.description)
    .bind(&track.audio_url)
    .bind(&track.cover_url)
    .bind(track.duration_ms)
    .bind(track.sort_order)
    .bind(track.created_at)
    .execute(pool)
    .await?;

    Ok(track)
}

/// Update editable fields of an existing track
pub async fn update_track(pool: &SqlitePool, track: &Track) -> Result<()> {
    let track = track.validated()?;

    let result = sqlx::query(
        r#"
        UPDATE tracks
        SET title = ?, description = ?, audio_url = ?, cover_url = ?, duration_ms = ?
        WHERE id = ?
        "#,
    )
    .bind(&track.title)
    .bind(&track.description)
    .bind(&track.audio_url)
    .bind(&track.cover_url)
    .bind(track.duration_ms)
    .bind(track.id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Track {}", track.id)));
    }
    Ok(())
}

/// Load track by id
pub async fn get_track(pool: &SqlitePool, id: Uuid) -> Result<Option<Track>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, description, audio_url, cover_url, duration_ms, sort_order, created_at
        FROM tracks
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(track_from_row).transpose()
}

/// All tracks in display order
pub async fn list_tracks(pool: &SqlitePool) -> Result<Vec<Track>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, description, audio_url, cover_url, duration_ms, sort_order, created_at
        FROM tracks
        ORDER BY sort_order, created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(track_from_row).collect()
}

/// Delete track, returning the removed record
pub async fn delete_track(pool: &SqlitePool, id: Uuid) -> Result<Track> {
    let track = get_track(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Track {}", id)))?;

    sqlx::query("DELETE FROM tracks WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(track)
}

/// Reorder tracks to match `ids`
pub async fn reorder_tracks(pool: &SqlitePool, ids: &[Uuid]) -> Result<()> {
    reorder(pool, OrderedTable::Tracks, ids).await
}

fn track_from_row(row: &SqliteRow) -> Result<Track> {
    let id: String = row.get("id");
    Ok(Track {
        id: parse_uuid(&id)?,
        title: row.get("title"),
        description: row.get("description"),
        audio_url: row.get("audio_url"),
        cover_url: row.get("cover_url"),
        duration_ms: row.get("duration_ms"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_insert_and_list_in_order() {
        let db = init_memory_database().await.unwrap();

        let first = insert_track(&db, &Track::new("Intro", "https://x/tracks/a.mp3"))
            .await
            .unwrap();
        let second = insert_track(&db, &Track::new("Outro", "https://x/tracks/b.mp3"))
            .await
            .unwrap();
        assert_eq!(first.sort_order, 0);
        assert_eq!(second.sort_order, 1);

        let titles: Vec<String> = list_tracks(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Intro", "Outro"]);
    }

    #[tokio::test]
    async fn test_fields_trimmed_and_validated() {
        let db = init_memory_database().await.unwrap();

        let mut track = Track::new("  Etude  ", "https://x/tracks/etude.mp3");
        track.description = Some("   ".to_string());
        let stored = insert_track(&db, &track).await.unwrap();
        assert_eq!(stored.title, "Etude");
        assert_eq!(stored.description, None);

        let loaded = get_track(&db, stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Etude");

        let blank = Track::new(" ", "https://x/tracks/blank.mp3");
        assert!(matches!(
            insert_track(&db, &blank).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = init_memory_database().await.unwrap();

        let mut track = insert_track(&db, &Track::new("Demo", "https://x/tracks/demo.mp3"))
            .await
            .unwrap();
        track.title = "Demo (remastered)".to_string();
        track.duration_ms = Some(185_000);
        update_track(&db, &track).await.unwrap();

        let loaded = get_track(&db, track.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Demo (remastered)");
        assert_eq!(loaded.duration_ms, Some(185_000));

        let removed = delete_track(&db, track.id).await.unwrap();
        assert_eq!(removed.id, track.id);
        assert!(get_track(&db, track.id).await.unwrap().is_none());

        assert!(matches!(
            delete_track(&db, track.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            update_track(&db, &track).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reorder_is_atomic() {
        let db = init_memory_database().await.unwrap();

        let a = insert_track(&db, &Track::new("A", "https://x/a.mp3")).await.unwrap();
        let b = insert_track(&db, &Track::new("B", "https://x/b.mp3")).await.unwrap();
        let c = insert_track(&db, &Track::new("C", "https://x/c.mp3")).await.unwrap();

        reorder_tracks(&db, &[c.id, a.id, b.id]).await.unwrap();
        let order: Vec<Uuid> = list_tracks(&db).await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);

        // Unknown id rolls everything back
        let result = reorder_tracks(&db, &[a.id, Uuid::new_v4()]).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        let order: Vec<Uuid> = list_tracks(&db).await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);
    }
}
