use serde_json::Value;
use sqlx::SqlitePool;

use crate::id::new_uuid_v7;
use crate::locations::{ensure_container_scoped, ensure_location_scoped};
use crate::model::{
    Item, ItemPatch, ItemRow, NewItem, ITEMS_NAME_REQUIRED, ITEMS_NOT_FOUND,
    VALIDATION_QUANTITY_NEGATIVE,
};
use crate::time::now_ms;
use crate::{AppError, AppResult};

const ITEM_COLUMNS: &str = "id, household_id, user_id, location_id, container_id, name, \
     description, photo_url, thumbnail_url, quantity, min_quantity, expires_at, category, \
     notes, tags, is_favourite, created_at, updated_at, last_confirmed_at";

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        Err(AppError::new(ITEMS_NAME_REQUIRED, "Item name is required."))
    } else {
        Ok(())
    }
}

fn validate_quantity(quantity: i64) -> AppResult<()> {
    if quantity < 0 {
        Err(AppError::new(
            VALIDATION_QUANTITY_NEGATIVE,
            "Quantity cannot be negative.",
        )
        .with_context("quantity", quantity.to_string()))
    } else {
        Ok(())
    }
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.as_str()),
        _ => q.bind(v.to_string()),
    }
}

pub async fn create_item(
    pool: &SqlitePool,
    household_id: &str,
    user_id: &str,
    input: NewItem,
) -> AppResult<Item> {
    validate_name(&input.name)?;
    let quantity = input.quantity.unwrap_or(0);
    validate_quantity(quantity)?;

    if let Some(location_id) = input.location_id.as_deref() {
        ensure_location_scoped(pool, household_id, location_id).await?;
    }
    if let Some(container_id) = input.container_id.as_deref() {
        ensure_container_scoped(pool, household_id, container_id).await?;
    }

    let id = new_uuid_v7();
    let now = now_ms();
    let tags = serde_json::to_string(&input.tags).map_err(AppError::from)?;

    sqlx::query(
        "INSERT INTO items (id, household_id, user_id, location_id, container_id, name, \
             description, photo_url, thumbnail_url, quantity, min_quantity, expires_at, \
             category, notes, tags, is_favourite, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(household_id)
    .bind(user_id)
    .bind(&input.location_id)
    .bind(&input.container_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.photo_url)
    .bind(&input.thumbnail_url)
    .bind(quantity)
    .bind(input.min_quantity)
    .bind(input.expires_at)
    .bind(&input.category)
    .bind(&input.notes)
    .bind(&tags)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    Ok(Item {
        id,
        household_id: household_id.to_string(),
        user_id: Some(user_id.to_string()),
        location_id: input.location_id,
        container_id: input.container_id,
        name: input.name,
        description: input.description,
        photo_url: input.photo_url,
        thumbnail_url: input.thumbnail_url,
        quantity,
        min_quantity: input.min_quantity,
        expires_at: input.expires_at,
        category: input.category,
        notes: input.notes,
        tags: input.tags,
        is_favourite: false,
        created_at: now,
        updated_at: now,
        last_confirmed_at: None,
    })
}

/// Batch intake, e.g. from shelf-photo analysis. Each entry is validated the
/// same way as an explicit add; the whole batch is one transaction.
pub async fn create_items_batch(
    pool: &SqlitePool,
    household_id: &str,
    user_id: &str,
    inputs: Vec<NewItem>,
) -> AppResult<Vec<Item>> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }
    for input in &inputs {
        validate_name(&input.name)?;
        validate_quantity(input.quantity.unwrap_or(0))?;
        if let Some(location_id) = input.location_id.as_deref() {
            ensure_location_scoped(pool, household_id, location_id).await?;
        }
        if let Some(container_id) = input.container_id.as_deref() {
            ensure_container_scoped(pool, household_id, container_id).await?;
        }
    }

    let mut created = Vec::with_capacity(inputs.len());
    let mut tx = pool.begin().await.map_err(AppError::from)?;
    for input in inputs {
        let id = new_uuid_v7();
        let now = now_ms();
        let quantity = input.quantity.unwrap_or(0);
        let tags = serde_json::to_string(&input.tags).map_err(AppError::from)?;
        sqlx::query(
            "INSERT INTO items (id, household_id, user_id, location_id, container_id, name, \
                 description, photo_url, thumbnail_url, quantity, min_quantity, expires_at, \
                 category, notes, tags, is_favourite, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(household_id)
        .bind(user_id)
        .bind(&input.location_id)
        .bind(&input.container_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.photo_url)
        .bind(&input.thumbnail_url)
        .bind(quantity)
        .bind(input.min_quantity)
        .bind(input.expires_at)
        .bind(&input.category)
        .bind(&input.notes)
        .bind(&tags)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        created.push(Item {
            id,
            household_id: household_id.to_string(),
            user_id: Some(user_id.to_string()),
            location_id: input.location_id,
            container_id: input.container_id,
            name: input.name,
            description: input.description,
            photo_url: input.photo_url,
            thumbnail_url: input.thumbnail_url,
            quantity,
            min_quantity: input.min_quantity,
            expires_at: input.expires_at,
            category: input.category,
            notes: input.notes,
            tags: input.tags,
            is_favourite: false,
            created_at: now,
            updated_at: now,
            last_confirmed_at: None,
        });
    }
    tx.commit().await.map_err(AppError::from)?;
    Ok(created)
}

/// A row in another household reads as absent.
pub async fn get_item(
    pool: &SqlitePool,
    household_id: &str,
    item_id: &str,
) -> AppResult<Option<Item>> {
    let row = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE id = ? AND household_id = ?"
    ))
    .bind(item_id)
    .bind(household_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?;
    Ok(row.map(Item::from))
}

pub async fn list_items(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<Item>> {
    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE household_id = ? ORDER BY name, id"
    ))
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;
    Ok(rows.into_iter().map(Item::from).collect())
}

/// Apply a partial update. Absent fields are untouched; explicit nulls clear.
pub async fn update_item(
    pool: &SqlitePool,
    household_id: &str,
    item_id: &str,
    patch: ItemPatch,
) -> AppResult<()> {
    let mut sets: Vec<(&str, Value)> = Vec::new();

    if let Some(name) = patch.name {
        validate_name(&name)?;
        sets.push(("name", Value::String(name)));
    }
    if let Some(quantity) = patch.quantity {
        validate_quantity(quantity)?;
        sets.push(("quantity", Value::from(quantity)));
    }
    if let Some(location_id) = patch.location_id {
        if let Some(id) = location_id.as_deref() {
            ensure_location_scoped(pool, household_id, id).await?;
        }
        sets.push((
            "location_id",
            location_id.map(Value::String).unwrap_or(Value::Null),
        ));
    }
    if let Some(container_id) = patch.container_id {
        if let Some(id) = container_id.as_deref() {
            ensure_container_scoped(pool, household_id, id).await?;
        }
        sets.push((
            "container_id",
            container_id.map(Value::String).unwrap_or(Value::Null),
        ));
    }
    if let Some(description) = patch.description {
        sets.push((
            "description",
            description.map(Value::String).unwrap_or(Value::Null),
        ));
    }
    if let Some(photo_url) = patch.photo_url {
        sets.push((
            "photo_url",
            photo_url.map(Value::String).unwrap_or(Value::Null),
        ));
    }
    if let Some(thumbnail_url) = patch.thumbnail_url {
        sets.push((
            "thumbnail_url",
            thumbnail_url.map(Value::String).unwrap_or(Value::Null),
        ));
    }
    if let Some(min_quantity) = patch.min_quantity {
        sets.push((
            "min_quantity",
            min_quantity.map(Value::from).unwrap_or(Value::Null),
        ));
    }
    if let Some(expires_at) = patch.expires_at {
        sets.push((
            "expires_at",
            expires_at.map(Value::from).unwrap_or(Value::Null),
        ));
    }
    if let Some(category) = patch.category {
        sets.push((
            "category",
            category.map(Value::String).unwrap_or(Value::Null),
        ));
    }
    if let Some(notes) = patch.notes {
        sets.push(("notes", notes.map(Value::String).unwrap_or(Value::Null)));
    }
    if let Some(tags) = patch.tags {
        let encoded = serde_json::to_string(&tags).map_err(AppError::from)?;
        sets.push(("tags", Value::String(encoded)));
    }
    if let Some(is_favourite) = patch.is_favourite {
        sets.push(("is_favourite", Value::Bool(is_favourite)));
    }
    if let Some(last_confirmed_at) = patch.last_confirmed_at {
        sets.push((
            "last_confirmed_at",
            last_confirmed_at.map(Value::from).unwrap_or(Value::Null),
        ));
    }

    if sets.is_empty() {
        return Ok(());
    }

    let set_clause: Vec<String> = sets.iter().map(|(col, _)| format!("{col} = ?")).collect();
    let sql = format!(
        "UPDATE items SET {}, updated_at = ? WHERE id = ? AND household_id = ?",
        set_clause.join(", ")
    );
    let values: Vec<Value> = sets.into_iter().map(|(_, v)| v).collect();
    let mut query = sqlx::query(&sql);
    for value in &values {
        query = bind_value(query, value);
    }
    let res = query
        .bind(now_ms())
        .bind(item_id)
        .bind(household_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;

    if res.rows_affected() == 0 {
        return Err(AppError::new(ITEMS_NOT_FOUND, "Item not found.")
            .with_context("item_id", item_id.to_string()));
    }
    Ok(())
}

pub async fn delete_item(pool: &SqlitePool, household_id: &str, item_id: &str) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM items WHERE id = ? AND household_id = ?")
        .bind(item_id)
        .bind(household_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    if res.rows_affected() == 0 {
        return Err(AppError::new(ITEMS_NOT_FOUND, "Item not found.")
            .with_context("item_id", item_id.to_string()));
    }
    Ok(())
}
