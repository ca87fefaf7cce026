//! Bulk item mutations. Every operation here follows the same guard: an
//! empty id list returns without touching storage, and every filter pairs
//! the id list with the caller's household id so foreign ids fall out of
//! the affected set silently instead of erroring.

use sqlx::{Row, SqlitePool};

use crate::locations::{ensure_container_scoped, ensure_location_scoped};
use crate::model::decode_tags;
use crate::time::now_ms;
use crate::{AppError, AppResult};

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// Deduplicated union of existing and incoming tags, first occurrence wins.
pub fn merge_tags(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    existing
        .iter()
        .chain(incoming)
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Merge `tags` into every item in `item_ids` that belongs to the household.
/// Returns the number of items actually touched.
pub async fn bulk_merge_tags(
    pool: &SqlitePool,
    household_id: &str,
    item_ids: &[String],
    tags: &[String],
) -> AppResult<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "SELECT id, tags FROM items WHERE household_id = ? AND id IN ({})",
        placeholders(item_ids.len())
    );
    let mut query = sqlx::query(&sql).bind(household_id);
    for id in item_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await.map_err(AppError::from)?;

    let now = now_ms();
    let mut affected = 0u64;
    for row in rows {
        let id: String = row.try_get("id").map_err(AppError::from)?;
        let raw: String = row.try_get("tags").map_err(AppError::from)?;
        let merged = merge_tags(&decode_tags(&raw), tags);
        let encoded = serde_json::to_string(&merged).map_err(AppError::from)?;

        sqlx::query("UPDATE items SET tags = ?, updated_at = ? WHERE id = ? AND household_id = ?")
            .bind(&encoded)
            .bind(now)
            .bind(&id)
            .bind(household_id)
            .execute(pool)
            .await
            .map_err(AppError::from)?;
        affected += 1;
    }

    Ok(affected)
}

/// Delete every listed item that belongs to the household.
pub async fn bulk_delete(
    pool: &SqlitePool,
    household_id: &str,
    item_ids: &[String],
) -> AppResult<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "DELETE FROM items WHERE household_id = ? AND id IN ({})",
        placeholders(item_ids.len())
    );
    let mut query = sqlx::query(&sql).bind(household_id);
    for id in item_ids {
        query = query.bind(id);
    }
    let res = query.execute(pool).await.map_err(AppError::from)?;
    Ok(res.rows_affected())
}

/// Move every listed item in the household to a new location (and container,
/// when given). The target must itself live in the household; a foreign
/// target reads as not found.
pub async fn bulk_relocate(
    pool: &SqlitePool,
    household_id: &str,
    item_ids: &[String],
    location_id: &str,
    container_id: Option<&str>,
) -> AppResult<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }

    ensure_location_scoped(pool, household_id, location_id).await?;
    if let Some(container_id) = container_id {
        ensure_container_scoped(pool, household_id, container_id).await?;
    }

    let sql = format!(
        "UPDATE items SET location_id = ?, container_id = ?, updated_at = ? \
         WHERE household_id = ? AND id IN ({})",
        placeholders(item_ids.len())
    );
    let mut query = sqlx::query(&sql)
        .bind(location_id)
        .bind(container_id)
        .bind(now_ms())
        .bind(household_id);
    for id in item_ids {
        query = query.bind(id);
    }
    let res = query.execute(pool).await.map_err(AppError::from)?;
    Ok(res.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn merge_is_a_deduplicated_union() {
        let existing = vec!["dairy".to_string(), "fridge".to_string()];
        let incoming = vec!["fridge".to_string(), "breakfast".to_string()];
        assert_eq!(
            merge_tags(&existing, &incoming),
            vec!["dairy", "fridge", "breakfast"]
        );
    }

    #[test]
    fn merge_dedups_within_inputs_too() {
        let existing = vec!["a".to_string(), "a".to_string()];
        let incoming = vec!["b".to_string(), "b".to_string()];
        assert_eq!(merge_tags(&existing, &incoming), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(
            existing in proptest::collection::vec("[a-z]{1,6}", 0..8),
            incoming in proptest::collection::vec("[a-z]{1,6}", 0..8),
        ) {
            let once = merge_tags(&existing, &incoming);
            let twice = merge_tags(&once, &incoming);
            prop_assert_eq!(once, twice);
        }
    }
}
