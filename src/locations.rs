use sqlx::SqlitePool;

use crate::id::new_uuid_v7;
use crate::model::{
    Container, Location, CONTAINERS_NOT_FOUND, LOCATIONS_NAME_REQUIRED, LOCATIONS_NOT_FOUND,
};
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// A location in another household is indistinguishable from a missing one.
pub(crate) async fn ensure_location_scoped(
    pool: &SqlitePool,
    household_id: &str,
    location_id: &str,
) -> AppResult<()> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT household_id FROM locations WHERE id = ?")
            .bind(location_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    if found.as_deref() == Some(household_id) {
        Ok(())
    } else {
        Err(AppError::new(LOCATIONS_NOT_FOUND, "Location not found.")
            .with_context("location_id", location_id.to_string()))
    }
}

pub(crate) async fn ensure_container_scoped(
    pool: &SqlitePool,
    household_id: &str,
    container_id: &str,
) -> AppResult<()> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT household_id FROM containers WHERE id = ?")
            .bind(container_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    if found.as_deref() == Some(household_id) {
        Ok(())
    } else {
        Err(AppError::new(CONTAINERS_NOT_FOUND, "Container not found.")
            .with_context("container_id", container_id.to_string()))
    }
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        Err(AppError::new(
            LOCATIONS_NAME_REQUIRED,
            "A name is required.",
        ))
    } else {
        Ok(())
    }
}

pub async fn create_location(
    pool: &SqlitePool,
    household_id: &str,
    user_id: &str,
    name: &str,
) -> AppResult<Location> {
    validate_name(name)?;
    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO locations (id, household_id, user_id, name, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(household_id)
    .bind(user_id)
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    Ok(Location {
        id,
        household_id: household_id.to_string(),
        user_id: Some(user_id.to_string()),
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn list_locations(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<Location>> {
    sqlx::query_as::<_, Location>(
        "SELECT id, household_id, user_id, name, created_at, updated_at \
         FROM locations WHERE household_id = ? ORDER BY name, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

/// Containers and items under the location fall back to unassigned via the
/// ON DELETE SET NULL foreign keys.
pub async fn delete_location(
    pool: &SqlitePool,
    household_id: &str,
    location_id: &str,
) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM locations WHERE id = ? AND household_id = ?")
        .bind(location_id)
        .bind(household_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    if res.rows_affected() == 0 {
        return Err(AppError::new(LOCATIONS_NOT_FOUND, "Location not found.")
            .with_context("location_id", location_id.to_string()));
    }
    Ok(())
}

pub async fn create_container(
    pool: &SqlitePool,
    household_id: &str,
    location_id: Option<&str>,
    name: &str,
    photo_url: Option<&str>,
) -> AppResult<Container> {
    validate_name(name)?;
    if let Some(location_id) = location_id {
        ensure_location_scoped(pool, household_id, location_id).await?;
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO containers (id, household_id, location_id, name, photo_url, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(household_id)
    .bind(location_id)
    .bind(name)
    .bind(photo_url)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    Ok(Container {
        id,
        household_id: household_id.to_string(),
        location_id: location_id.map(str::to_string),
        name: name.to_string(),
        photo_url: photo_url.map(str::to_string),
        created_at: now,
        updated_at: now,
    })
}

pub async fn list_containers(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<Container>> {
    sqlx::query_as::<_, Container>(
        "SELECT id, household_id, location_id, name, photo_url, created_at, updated_at \
         FROM containers WHERE household_id = ? ORDER BY name, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

/// Items inside keep their location and drop to its direct-item list.
pub async fn delete_container(
    pool: &SqlitePool,
    household_id: &str,
    container_id: &str,
) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM containers WHERE id = ? AND household_id = ?")
        .bind(container_id)
        .bind(household_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    if res.rows_affected() == 0 {
        return Err(AppError::new(CONTAINERS_NOT_FOUND, "Container not found.")
            .with_context("container_id", container_id.to_string()));
    }
    Ok(())
}
