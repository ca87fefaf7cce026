use anyhow::Result;
use futures::future::{ready, BoxFuture};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use larder_lib::commands;
use larder_lib::external::{Identity, VerifiedIdentity};
use larder_lib::household;
use larder_lib::model;
use larder_lib::{AppError, AppResult};

async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;
    larder_lib::migrate::apply_migrations(&pool).await?;
    Ok(pool)
}

async fn household_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM household")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[tokio::test]
async fn first_use_provisions_a_default_household() -> Result<()> {
    let pool = memory_pool().await?;

    let hh = household::resolve_household(&pool, "auth0|alice", Some("alice@example.com")).await?;
    assert_eq!(household_count(&pool).await?, 1);

    let stored = household::get_household(&pool, &hh)
        .await?
        .expect("household row exists");
    assert_eq!(stored.name, household::DEFAULT_HOUSEHOLD_NAME);
    assert_eq!(stored.owner_user_id.as_deref(), Some("auth0|alice"));

    let bound: Option<String> = sqlx::query_scalar("SELECT household_id FROM users WHERE id = ?")
        .bind("auth0|alice")
        .fetch_one(&pool)
        .await?;
    assert_eq!(bound.as_deref(), Some(hh.as_str()));
    Ok(())
}

#[tokio::test]
async fn resolve_is_stable_across_calls() -> Result<()> {
    let pool = memory_pool().await?;

    let first = household::resolve_household(&pool, "auth0|bob", None).await?;
    let second = household::resolve_household(&pool, "auth0|bob", None).await?;
    assert_eq!(first, second);
    assert_eq!(household_count(&pool).await?, 1);
    Ok(())
}

#[tokio::test]
async fn existing_binding_short_circuits_provisioning() -> Result<()> {
    let pool = memory_pool().await?;

    let created = household::create_household(&pool, "Shared Flat", Some("auth0|carol")).await?;
    let resolved = household::resolve_household(&pool, "auth0|carol", None).await?;
    assert_eq!(resolved, created.id);
    assert_eq!(household_count(&pool).await?, 1);
    Ok(())
}

#[tokio::test]
async fn read_only_lookup_never_provisions() -> Result<()> {
    let pool = memory_pool().await?;

    let found = household::household_for_user(&pool, "auth0|nobody").await?;
    assert!(found.is_none());
    assert_eq!(household_count(&pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn members_are_everyone_bound_to_the_household() -> Result<()> {
    let pool = memory_pool().await?;

    let hh = household::create_household(&pool, "Family", Some("auth0|dave")).await?;
    household::resolve_household(&pool, "auth0|stranger", None).await?;

    let members = household::household_members(&pool, &hh.id).await?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, "auth0|dave");
    Ok(())
}

#[tokio::test]
async fn provisioning_failure_surfaces_typed_error() -> Result<()> {
    let pool = memory_pool().await?;
    // Dropping the table turns the household insert into a storage failure.
    sqlx::query("DROP TABLE household").execute(&pool).await?;

    let err = household::resolve_household(&pool, "auth0|erin", None)
        .await
        .expect_err("insert must fail");
    assert_eq!(err.code(), model::HOUSEHOLD_PROVISIONING_FAILED);
    assert!(err.cause().is_some());
    Ok(())
}

struct FixedIdentity;

impl Identity for FixedIdentity {
    fn verify(&self, token: &str) -> BoxFuture<'static, AppResult<VerifiedIdentity>> {
        if token == "good-token" {
            Box::pin(ready(Ok(VerifiedIdentity {
                user_id: "auth0|alice".to_string(),
                email: Some("alice@example.com".to_string()),
            })))
        } else {
            Box::pin(ready(Err(AppError::new("IDP/EXPIRED", "token expired"))))
        }
    }
}

#[tokio::test]
async fn identity_failures_collapse_to_unauthenticated() -> Result<()> {
    let who = commands::verify_identity_command(&FixedIdentity, "good-token").await?;
    assert_eq!(who.user_id, "auth0|alice");

    let err = commands::verify_identity_command(&FixedIdentity, "stale")
        .await
        .expect_err("bad credential must be rejected");
    assert_eq!(err.code(), model::AUTH_UNAUTHENTICATED);
    // The verifier's own failure is preserved underneath.
    assert_eq!(err.cause().map(|c| c.code()), Some("IDP/EXPIRED"));
    Ok(())
}

#[tokio::test]
async fn write_commands_provision_read_commands_do_not() -> Result<()> {
    let pool = memory_pool().await?;

    let tree = commands::inventory_tree_command(&pool, "auth0|fresh").await?;
    assert!(tree.locations.is_empty());
    assert_eq!(household_count(&pool).await?, 0);

    commands::add_shopping_item_command(&pool, "auth0|fresh", "Milk", 1).await?;
    assert_eq!(household_count(&pool).await?, 1);
    Ok(())
}
