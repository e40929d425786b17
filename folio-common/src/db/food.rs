//! Food-photo gallery

use super::{next_sort_order, non_blank, parse_uuid, required, reorder, OrderedTable};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Gallery item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl FoodItem {
    pub fn new(title: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            image_url: image_url.into(),
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    fn validated(&self) -> Result<Self> {
        let mut item = self.clone();
        item.title = required("Title", &self.title)?;
        item.image_url = required("Image URL", &self.image_url)?;
        item.description = non_blank(self.description.clone());
        Ok(item)
    }
}

pub async fn insert_food_item(pool: &SqlitePool, item: &FoodItem) -> Result<FoodItem> {
    let mut item = item.validated()?;
    item.sort_order = next_sort_order(pool, OrderedTable::FoodItems).await?;

    sqlx::query(
        r#"
        INSERT INTO food_items (id, title, description, image_url, sort_order, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id.to_string())
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.image_url)
    .bind(item.sort_order)
    .bind(item.created_at)
    .execute(pool)
    .await?;

    Ok(item)
}

pub async fn update_food_item(pool: &SqlitePool, item: &FoodItem) -> Result<()> {
    let item = item.validated()?;

    let result = sqlx::query(
        "UPDATE food_items SET title = ?, description = ?, image_url = ? WHERE id = ?",
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.image_url)
    .bind(item.id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Food item {}", item.id)));
    }
    Ok(())
}

pub async fn get_food_item(pool: &SqlitePool, id: Uuid) -> Result<Option<FoodItem>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, description, image_url, sort_order, created_at
        FROM food_items
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(food_item_from_row).transpose()
}

pub async fn list_food_items(pool: &SqlitePool) -> Result<Vec<FoodItem>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, description, image_url, sort_order, created_at
        FROM food_items
        ORDER BY sort_order, created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(food_item_from_row).collect()
}

/// Delete gallery item, returning the removed record
pub async fn delete_food_item(pool: &SqlitePool, id: Uuid) -> Result<FoodItem> {
    let item = get_food_item(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Food item {}", id)))?;

    sqlx::query("DELETE FROM food_items WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(item)
}

pub async fn reorder_food_items(pool: &SqlitePool, ids: &[Uuid]) -> Result<()> {
    reorder(pool, OrderedTable::FoodItems, ids).await
}

fn food_item_from_row(row: &SqliteRow) -> Result<FoodItem> {
    let id: String = row.get("id");
    Ok(FoodItem {
        id: parse_uuid(&id)?,
        title: row.get("title"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
    })
}
