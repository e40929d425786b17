//! Visitor comments on tracks, tabs and gallery items
//!
//! New comments are held for moderation; only approved ones are listed
//! publicly.

use super::parse_uuid;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_AUTHOR_CHARS: usize = 80;
pub const MAX_BODY_CHARS: usize = 2000;

/// What a comment is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentTarget {
    Track,
    Tab,
    Food,
}

impl CommentTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentTarget::Track => "track",
            CommentTarget::Tab => "tab",
            CommentTarget::Food => "food",
        }
    }
}

impl FromStr for CommentTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "track" => Ok(CommentTarget::Track),
            "tab" => Ok(CommentTarget::Tab),
            "food" => Ok(CommentTarget::Food),
            other => Err(Error::InvalidInput(format!("Unknown comment target: {}", other))),
        }
    }
}

impl std::fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub target: CommentTarget,
    pub target_id: Uuid,
    pub author_name: String,
    pub body: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Trim and bound a visitor-submitted author/body pair
pub(crate) fn validate_message(author_name: &str, body: &str) -> Result<(String, String)> {
    let author = author_name.trim();
    let body = body.trim();

    if author.is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    if author.chars().count() > MAX_AUTHOR_CHARS {
        return Err(Error::InvalidInput(format!(
            "Name is longer than {} characters",
            MAX_AUTHOR_CHARS
        )));
    }
    if body.is_empty() {
        return Err(Error::InvalidInput("Message is required".to_string()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(Error::InvalidInput(format!(
            "Message is longer than {} characters",
            MAX_BODY_CHARS
        )));
    }

    Ok((author.to_string(), body.to_string()))
}

/// Submit a visitor comment (unapproved)
pub async fn add_comment(
    pool: &SqlitePool,
    target: CommentTarget,
    target_id: Uuid,
    author_name: &str,
    body: &str,
) -> Result<Comment> {
    let (author_name, body) = validate_message(author_name, body)?;
    let comment = Comment {
        id: Uuid::new_v4(),
        target,
        target_id,
        author_name,
        body,
        approved: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO comments (id, target_kind, target_id, author_name, body, approved, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(comment.id.to_string())
    .bind(comment.target.as_str())
    .bind(comment.target_id.to_string())
    .bind(&comment.author_name)
    .bind(&comment.body)
    .bind(comment.created_at)
    .execute(pool)
    .await?;

    Ok(comment)
}

/// Comments on one item, oldest first
pub async fn list_comments_for(
    pool: &SqlitePool,
    target: CommentTarget,
    target_id: Uuid,
    include_unapproved: bool,
) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, target_kind, target_id, author_name, body, approved, created_at
        FROM comments
        WHERE target_kind = ? AND target_id = ? AND (approved = 1 OR ?)
        ORDER BY created_at
        "#,
    )
    .bind(target.as_str())
    .bind(target_id.to_string())
    .bind(include_unapproved)
    .fetch_all(pool)
    .await?;

    rows.iter().map(comment_from_row).collect()
}

/// Moderation queue, oldest first
pub async fn list_pending_comments(pool: &SqlitePool) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, target_kind, target_id, author_name, body, approved, created_at
        FROM comments
        WHERE approved = 0
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(comment_from_row).collect()
}

/// Every comment, newest first
pub async fn list_all_comments(pool: &SqlitePool) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, target_kind, target_id, author_name, body, approved, created_at
        FROM comments
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(comment_from_row).collect()
}

pub async fn approve_comment(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE comments SET approved = 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Comment {}", id)));
    }
    Ok(())
}

pub async fn delete_comment(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Comment {}", id)));
    }
    Ok(())
}

/// Drop every comment attached to a deleted item
pub async fn delete_comments_for(
    pool: &SqlitePool,
    target: CommentTarget,
    target_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM comments WHERE target_kind = ? AND target_id = ?")
        .bind(target.as_str())
        .bind(target_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    let id: String = row.get("id");
    let target: String = row.get("target_kind");
    let target_id: String = row.get("target_id");
    Ok(Comment {
        id: parse_uuid(&id)?,
        target: target.parse()?,
        target_id: parse_uuid(&target_id)?,
        author_name: row.get("author_name"),
        body: row.get("body"),
        approved: row.get("approved"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_comment_moderation_flow() {
        let db = init_memory_database().await.unwrap();
        let tab_id = Uuid::new_v4();

        let comment = add_comment(&db, CommentTarget::Tab, tab_id, " Sam ", "Lovely fingering!")
            .await
            .unwrap();
        assert_eq!(comment.author_name, "Sam");
        assert!(!comment.approved);

        // Hidden from the public listing until approved
        let public = list_comments_for(&db, CommentTarget::Tab, tab_id, false)
            .await
            .unwrap();
        assert!(public.is_empty());
        assert_eq!(list_pending_comments(&db).await.unwrap().len(), 1);

        approve_comment(&db, comment.id).await.unwrap();
        let public = list_comments_for(&db, CommentTarget::Tab, tab_id, false)
            .await
            .unwrap();
        assert_eq!(public.len(), 1);
        assert!(public[0].approved);
        assert!(list_pending_comments(&db).await.unwrap().is_empty());

        // Other targets are unaffected
        let other = list_comments_for(&db, CommentTarget::Track, tab_id, true)
            .await
            .unwrap();
        assert!(other.is_empty());

        delete_comment(&db, comment.id).await.unwrap();
        assert!(matches!(
            delete_comment(&db, comment.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_comments_for_target() {
        let db = init_memory_database().await.unwrap();
        let track_id = Uuid::new_v4();

        add_comment(&db, CommentTarget::Track, track_id, "A", "one").await.unwrap();
        add_comment(&db, CommentTarget::Track, track_id, "B", "two").await.unwrap();
        add_comment(&db, CommentTarget::Food, track_id, "C", "three").await.unwrap();

        let removed = delete_comments_for(&db, CommentTarget::Track, track_id)
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(list_all_comments(&db).await.unwrap().len(), 1);
    }

    #[test]
    fn test_message_validation() {
        assert!(validate_message("", "body").is_err());
        assert!(validate_message("name", "   ").is_err());
        assert!(validate_message(&"n".repeat(MAX_AUTHOR_CHARS + 1), "body").is_err());
        assert!(validate_message("name", &"b".repeat(MAX_BODY_CHARS + 1)).is_err());

        // Limits count characters, not bytes
        let author = "é".repeat(MAX_AUTHOR_CHARS);
        assert!(validate_message(&author, "ok").is_ok());
    }

    #[test]
    fn test_target_parse() {
        assert_eq!("tab".parse::<CommentTarget>().unwrap(), CommentTarget::Tab);
        assert!("video".parse::<CommentTarget>().is_err());
    }
}
