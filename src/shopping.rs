use sqlx::SqlitePool;

use crate::id::new_uuid_v7;
use crate::model::{ShoppingItem, SHOPPING_NAME_REQUIRED, SHOPPING_NOT_FOUND};
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// Shopping entries are free text, deliberately not linked to inventory items.
pub async fn add_shopping_item(
    pool: &SqlitePool,
    household_id: &str,
    user_id: &str,
    name: &str,
    quantity: i64,
) -> AppResult<ShoppingItem> {
    if name.trim().is_empty() {
        return Err(AppError::new(
            SHOPPING_NAME_REQUIRED,
            "A shopping list entry needs a name.",
        ));
    }

    let id = new_uuid_v7();
    let now = now_ms();
    let quantity = quantity.max(1);
    sqlx::query(
        "INSERT INTO shopping_items (id, household_id, name, quantity, purchased, added_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, ?, ?, ?)",
    )
    .bind(&id)
    .bind(household_id)
    .bind(name)
    .bind(quantity)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    Ok(ShoppingItem {
        id,
        household_id: household_id.to_string(),
        name: name.to_string(),
        quantity,
        purchased: false,
        added_by: Some(user_id.to_string()),
        created_at: now,
        updated_at: now,
    })
}

pub async fn list_shopping_items(
    pool: &SqlitePool,
    household_id: &str,
) -> AppResult<Vec<ShoppingItem>> {
    sqlx::query_as::<_, ShoppingItem>(
        "SELECT id, household_id, name, quantity, purchased, added_by, created_at, updated_at \
         FROM shopping_items WHERE household_id = ? ORDER BY purchased, created_at, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

pub async fn set_purchased(
    pool: &SqlitePool,
    household_id: &str,
    shopping_item_id: &str,
    purchased: bool,
) -> AppResult<()> {
    let res = sqlx::query(
        "UPDATE shopping_items SET purchased = ?, updated_at = ? \
         WHERE id = ? AND household_id = ?",
    )
    .bind(purchased as i64)
    .bind(now_ms())
    .bind(shopping_item_id)
    .bind(household_id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    if res.rows_affected() == 0 {
        return Err(AppError::new(SHOPPING_NOT_FOUND, "Shopping entry not found.")
            .with_context("shopping_item_id", shopping_item_id.to_string()));
    }
    Ok(())
}

pub async fn delete_shopping_item(
    pool: &SqlitePool,
    household_id: &str,
    shopping_item_id: &str,
) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM shopping_items WHERE id = ? AND household_id = ?")
        .bind(shopping_item_id)
        .bind(household_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    if res.rows_affected() == 0 {
        return Err(AppError::new(SHOPPING_NOT_FOUND, "Shopping entry not found.")
            .with_context("shopping_item_id", shopping_item_id.to_string()));
    }
    Ok(())
}
