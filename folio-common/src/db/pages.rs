//! Editable page text (about blurb, section headings, footer)
//!
//! Key/value pairs the site renders in place of hard-coded copy.

use crate::{Error, Result};
use sqlx::SqlitePool;

/// Keys are lowercase dotted paths such as `home.intro` or `footer.text`
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= 100
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid page content key: {:?}", key)))
    }
}

pub async fn get_page_content(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    validate_key(key)?;
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM page_content WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

pub async fn set_page_content(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    validate_key(key)?;
    sqlx::query(
        r#"
        INSERT INTO page_content (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// All pairs sharing a prefix (e.g. `home.`), sorted by key
pub async fn list_page_content(pool: &SqlitePool, prefix: &str) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT key, value FROM page_content WHERE substr(key, 1, length(?)) = ? ORDER BY key",
    )
    .bind(prefix)
    .bind(prefix)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn delete_page_content(pool: &SqlitePool, key: &str) -> Result<bool> {
    validate_key(key)?;
    let result = sqlx::query("DELETE FROM page_content WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
