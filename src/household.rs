use sqlx::SqlitePool;

use crate::id::new_uuid_v7;
use crate::model::{Household, User, HOUSEHOLD_PROVISIONING_FAILED};
use crate::time::now_ms;
use crate::{AppError, AppResult};

pub const DEFAULT_HOUSEHOLD_NAME: &str = "My Household";

/// Read-only scope lookup. Read and bulk paths use this so a user without a
/// household degrades to empty results instead of provisioning one.
pub async fn household_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Option<String>> {
    let household: Option<Option<String>> =
        sqlx::query_scalar("SELECT household_id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    Ok(household.flatten())
}

/// Resolve the caller's household id, provisioning a default household on
/// first use. This is the only place households are created implicitly.
///
/// Two concurrent first-time calls for one user can each insert a household;
/// the later user upsert wins and the loser is left orphaned. Accepted as a
/// rare, low-impact race rather than papered over with locks the storage
/// layer does not provide.
pub async fn resolve_household(
    pool: &SqlitePool,
    user_id: &str,
    email: Option<&str>,
) -> AppResult<String> {
    if let Some(found) = household_for_user(pool, user_id).await? {
        return Ok(found);
    }

    let household_id = new_uuid_v7();
    let now = now_ms();

    let provision = async {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT INTO household (id, name, owner_user_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&household_id)
        .bind(DEFAULT_HOUSEHOLD_NAME)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO users (id, email, household_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               household_id = excluded.household_id, \
               email = COALESCE(excluded.email, users.email), \
               updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(email)
        .bind(&household_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok::<_, sqlx::Error>(())
    };

    if let Err(err) = provision.await {
        return Err(AppError::new(
            HOUSEHOLD_PROVISIONING_FAILED,
            "Could not create a household for this account.",
        )
        .with_context("user_id", user_id.to_string())
        .with_cause(AppError::from(err)));
    }

    tracing::info!(
        target = "larder",
        event = "household_provisioned",
        user_id = %user_id,
        household_id = %household_id,
    );
    Ok(household_id)
}

/// Explicit household creation; binds the owner's user row when one is given.
pub async fn create_household(
    pool: &SqlitePool,
    name: &str,
    owner_user_id: Option<&str>,
) -> AppResult<Household> {
    let id = new_uuid_v7();
    let now = now_ms();

    let mut tx = pool.begin().await.map_err(AppError::from)?;
    sqlx::query(
        "INSERT INTO household (id, name, owner_user_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(owner_user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(AppError::from)?;

    if let Some(owner) = owner_user_id {
        sqlx::query(
            "INSERT INTO users (id, household_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               household_id = excluded.household_id, \
               updated_at = excluded.updated_at",
        )
        .bind(owner)
        .bind(&id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;
    }
    tx.commit().await.map_err(AppError::from)?;

    Ok(Household {
        id,
        name: name.to_string(),
        owner_user_id: owner_user_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_household(pool: &SqlitePool, household_id: &str) -> AppResult<Option<Household>> {
    sqlx::query_as::<_, Household>(
        "SELECT id, name, owner_user_id, created_at, updated_at FROM household WHERE id = ?",
    )
    .bind(household_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)
}

/// Everyone whose user row points at the household.
pub async fn household_members(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, household_id, created_at, updated_at \
         FROM users WHERE household_id = ? ORDER BY created_at, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}
