//! Guestbook messages
//!
//! Site-wide visitor messages. Published immediately; the admin removes
//! unwanted ones.

use super::comments::validate_message;
use super::parse_uuid;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestbookMessage {
    pub id: Uuid,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub async fn add_message(
    pool: &SqlitePool,
    author_name: &str,
    body: &str,
) -> Result<GuestbookMessage> {
    let (author_name, body) = validate_message(author_name, body)?;
    let message = GuestbookMessage {
        id: Uuid::new_v4(),
        author_name,
        body,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO guestbook_messages (id, author_name, body, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(message.id.to_string())
    .bind(&message.author_name)
    .bind(&message.body)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// Newest first, at most `limit` messages
pub async fn list_messages(pool: &SqlitePool, limit: u32) -> Result<Vec<GuestbookMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT id, author_name, body, created_at
        FROM guestbook_messages
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(message_from_row).collect()
}

pub async fn delete_message(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM guestbook_messages WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Guestbook message {}", id)));
    }
    Ok(())
}

fn message_from_row(row: &SqliteRow) -> Result<GuestbookMessage> {
    let id: String = row.get("id");
    Ok(GuestbookMessage {
        id: parse_uuid(&id)?,
        author_name: row.get("author_name"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    })
}
