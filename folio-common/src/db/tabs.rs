//! Guitar tablature embeds

use super::{next_sort_order, non_blank, parse_uuid, required, reorder, OrderedTable};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Tab embed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabEmbed {
    pub id: Uuid,
    pub title: String,
    pub artist: Option<String>,
    /// Public URL of the Guitar Pro / MusicXML file the engine renders
    pub file_url: String,
    /// Instrument to synthesize with, overriding the site default
    pub default_instrument: Option<u8>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl TabEmbed {
    pub fn new(title: impl Into<String>, file_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: None,
            file_url: file_url.into(),
            default_instrument: None,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    fn validated(&self) -> Result<Self> {
        let mut tab = self.clone();
        tab.title = required("Title", &self.title)?;
        tab.file_url = required("Tab file URL", &self.file_url)?;
        tab.artist = non_blank(self.artist.clone());
        if let Some(program) = tab.default_instrument {
            if program > 127 {
                return Err(Error::InvalidInput(format!(
                    "MIDI program must be 0-127, got {}",
                    program
                )));
            }
        }
        Ok(tab)
    }
}

pub async fn insert_tab(pool: &SqlitePool, tab: &TabEmbed) -> Result<TabEmbed> {
    let mut tab = tab.validated()?;
    tab.sort_order = next_sort_order(pool, OrderedTable::Tabs).await?;

    sqlx::query(
        r#"
        INSERT INTO guitar_tabs (
            id, title, artist, file_url, default_instrument, sort_order, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tab.id.to_string())
    .bind(&tab.title)
    .bind(&tab.artist)
    .bind(&tab.file_url)
    .bind(tab.default_instrument.map(i64::from))
    .bind(tab.sort_order)
    .bind(tab.created_at)
    .execute(pool)
    .await?;

    Ok(tab)
}

pub async fn update_tab(pool: &SqlitePool, tab: &TabEmbed) -> Result<()> {
    let tab = tab.validated()?;

    let result = sqlx::query(
        r#"
        UPDATE guitar_tabs
        SET title = ?, artist = ?, file_url = ?, default_instrument = ?
        WHERE id = ?
        "#,
    )
    .bind(&tab.title)
    .bind(&tab.artist)
    .bind(&tab.file_url)
    .bind(tab.default_instrument.map(i64::from))
    .bind(tab.id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Tab {}", tab.id)));
    }
    Ok(())
}

pub async fn get_tab(pool: &SqlitePool, id: Uuid) -> Result<Option<TabEmbed>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, artist, file_url, default_instrument, sort_order, created_at
        FROM guitar_tabs
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(tab_from_row).transpose()
}

pub async fn list_tabs(pool: &SqlitePool) -> Result<Vec<TabEmbed>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, artist, file_url, default_instrument, sort_order, created_at
        FROM guitar_tabs
        ORDER BY sort_order, created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(tab_from_row).collect()
}

/// Delete tab, returning the removed record
pub async fn delete_tab(pool: &SqlitePool, id: Uuid) -> Result<TabEmbed> {
    let tab = get_tab(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Tab {}", id)))?;

    sqlx::query("DELETE FROM guitar_tabs WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(tab)
}

pub async fn reorder_tabs(pool: &SqlitePool, ids: &[Uuid]) -> Result<()> {
    reorder(pool, OrderedTable::Tabs, ids).await
}

fn tab_from_row(row: &SqliteRow) -> Result<TabEmbed> {
    let id: String = row.get("id");
    let default_instrument: Option<i64> = row.get("default_instrument");
    Ok(TabEmbed {
        id: parse_uuid(&id)?,
        title: row.get("title"),
        artist: row.get("artist"),
        file_url: row.get("file_url"),
        default_instrument: default_instrument.and_then(|p| u8::try_from(p).ok()),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_tab_with_default_instrument() {
        let db = init_memory_database().await.unwrap();

        let mut tab = TabEmbed::new("Romanza", "https://x/tabs/romanza.gp5");
        tab.artist = Some("Anonymous".to_string());
        tab.default_instrument = Some(24);
        let stored = insert_tab(&db, &tab).await.unwrap();

        let loaded = get_tab(&db, stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.default_instrument, Some(24));
        assert_eq!(loaded.artist.as_deref(), Some("Anonymous"));

        let mut cleared = loaded.clone();
        cleared.default_instrument = None;
        update_tab(&db, &cleared).await.unwrap();
        let loaded = get_tab(&db, stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.default_instrument, None);
    }

    #[tokio::test]
    async fn test_invalid_program_rejected() {
        let db = init_memory_database().await.unwrap();

        let mut tab = TabEmbed::new("Bad", "https://x/tabs/bad.gp");
        tab.default_instrument = Some(200);
        assert!(matches!(insert_tab(&db, &tab).await, Err(Error::InvalidInput(_))));
        assert!(list_tabs(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_tab() {
        let db = init_memory_database().await.unwrap();
        assert!(matches!(
            delete_tab(&db, Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }
}
