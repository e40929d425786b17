//! Database access layer
//!
//! Content tables (tracks, food gallery, tabs, comments, guestbook, page
//! text) and the settings key-value store.

pub mod comments;
pub mod food;
pub mod guestbook;
pub mod init;
pub mod pages;
pub mod settings;
pub mod tabs;
pub mod tracks;

pub use init::{init_database, init_memory_database};

use crate::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Ordered content tables that support manual reordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedTable {
    Tracks,
    FoodItems,
    Tabs,
}

impl OrderedTable {
    fn table_name(self) -> &'static str {
        match self {
            OrderedTable::Tracks => "tracks",
            OrderedTable::FoodItems => "food_items",
            OrderedTable::Tabs => "guitar_tabs",
        }
    }
}

/// Sort order for a newly inserted row: one past the current maximum
pub(crate) async fn next_sort_order(pool: &SqlitePool, table: OrderedTable) -> Result<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM {}",
        table.table_name()
    );
    let next: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(next)
}

/// Rewrite `sort_order` so rows appear in the given id order
///
/// Runs in a single transaction; an unknown id rolls the whole reorder back.
pub async fn reorder(pool: &SqlitePool, table: OrderedTable, ids: &[Uuid]) -> Result<()> {
    let sql = format!("UPDATE {} SET sort_order = ? WHERE id = ?", table.table_name());
    let mut tx = pool.begin().await?;

    for (position, id) in ids.iter().enumerate() {
        let result = sqlx::query(&sql)
            .bind(position as i64)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{} row {}", table.table_name(), id)));
        }
    }

    tx.commit().await?;
    Ok(())
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(value)?)
}

/// Trim an optional free-text field, mapping blank to None
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim a required field, rejecting blank input
pub(crate) fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
