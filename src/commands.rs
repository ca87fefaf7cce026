//! The transport-independent operation surface. Each command takes a
//! verified user id, resolves the caller's household scope, and delegates to
//! the domain modules. Write paths provision a household on first use; read
//! and bulk paths degrade to empty results when the caller has none.

use sqlx::SqlitePool;

use crate::consumption::{self, ConsumptionForecast};
use crate::external::{Identity, InviteNotifier, ShelfAnalyzer, VerifiedIdentity};
use crate::household;
use crate::inventory::{self, InventoryTree};
use crate::invite;
use crate::model::{
    Invitation, Item, NewItem, ShoppingItem, AUTH_UNAUTHENTICATED, ITEMS_NOT_FOUND,
};
use crate::{bulk, items, shopping, AppError, AppResult};

fn unscoped_item(item_id: &str) -> AppError {
    AppError::new(ITEMS_NOT_FOUND, "Item not found.").with_context("item_id", item_id.to_string())
}

/// Exchange a bearer credential for a verified identity. Every verifier
/// failure collapses to one code so callers cannot probe why a credential
/// was rejected.
pub async fn verify_identity_command(
    identity: &dyn Identity,
    token: &str,
) -> AppResult<VerifiedIdentity> {
    identity.verify(token).await.map_err(|err| {
        AppError::new(AUTH_UNAUTHENTICATED, "Caller identity could not be verified.")
            .with_cause(err)
    })
}

pub async fn resolve_household_command(
    pool: &SqlitePool,
    user_id: &str,
    email: Option<&str>,
) -> AppResult<String> {
    household::resolve_household(pool, user_id, email)
        .await
        .map_err(|err| err.with_context("operation", "resolve_household"))
}

/// Full inventory tree for the caller's household; an unscoped caller sees
/// an empty tree, not an error.
pub async fn inventory_tree_command(pool: &SqlitePool, user_id: &str) -> AppResult<InventoryTree> {
    let Some(household_id) = household::household_for_user(pool, user_id).await? else {
        return Ok(InventoryTree::default());
    };
    inventory::tree_for_household(pool, &household_id)
        .await
        .map_err(|err| {
            err.with_context("operation", "inventory_tree")
                .with_context("household_id", household_id.clone())
        })
}

pub async fn issue_invitation_command(
    pool: &SqlitePool,
    notifier: &dyn InviteNotifier,
    user_id: &str,
    invited_email: &str,
) -> AppResult<Invitation> {
    let household_id = household::resolve_household(pool, user_id, None).await?;
    invite::issue_invitation(pool, notifier, &household_id, invited_email)
        .await
        .map_err(|err| {
            err.with_context("operation", "issue_invitation")
                .with_context("household_id", household_id.clone())
        })
}

pub async fn record_consumption_command(
    pool: &SqlitePool,
    user_id: &str,
    item_id: &str,
    consumed: i64,
) -> AppResult<i64> {
    let Some(household_id) = household::household_for_user(pool, user_id).await? else {
        return Err(unscoped_item(item_id));
    };
    consumption::record_consumption(pool, &household_id, item_id, consumed)
        .await
        .map_err(|err| {
            err.with_context("operation", "record_consumption")
                .with_context("item_id", item_id.to_string())
        })
}

pub async fn consumption_forecast_command(
    pool: &SqlitePool,
    user_id: &str,
    item_id: &str,
) -> AppResult<ConsumptionForecast> {
    let Some(household_id) = household::household_for_user(pool, user_id).await? else {
        return Err(unscoped_item(item_id));
    };
    consumption::forecast(pool, &household_id, item_id)
        .await
        .map_err(|err| {
            err.with_context("operation", "consumption_forecast")
                .with_context("item_id", item_id.to_string())
        })
}

pub async fn bulk_merge_tags_command(
    pool: &SqlitePool,
    user_id: &str,
    item_ids: &[String],
    tags: &[String],
) -> AppResult<u64> {
    let Some(household_id) = household::household_for_user(pool, user_id).await? else {
        return Ok(0);
    };
    bulk::bulk_merge_tags(pool, &household_id, item_ids, tags)
        .await
        .map_err(|err| {
            err.with_context("operation", "bulk_merge_tags")
                .with_context("household_id", household_id.clone())
        })
}

pub async fn bulk_delete_command(
    pool: &SqlitePool,
    user_id: &str,
    item_ids: &[String],
) -> AppResult<u64> {
    let Some(household_id) = household::household_for_user(pool, user_id).await? else {
        return Ok(0);
    };
    bulk::bulk_delete(pool, &household_id, item_ids)
        .await
        .map_err(|err| {
            err.with_context("operation", "bulk_delete")
                .with_context("household_id", household_id.clone())
        })
}

pub async fn bulk_relocate_command(
    pool: &SqlitePool,
    user_id: &str,
    item_ids: &[String],
    location_id: &str,
    container_id: Option<&str>,
) -> AppResult<u64> {
    let Some(household_id) = household::household_for_user(pool, user_id).await? else {
        return Ok(0);
    };
    bulk::bulk_relocate(pool, &household_id, item_ids, location_id, container_id)
        .await
        .map_err(|err| {
            err.with_context("operation", "bulk_relocate")
                .with_context("household_id", household_id.clone())
        })
}

pub async fn create_item_command(
    pool: &SqlitePool,
    user_id: &str,
    input: NewItem,
) -> AppResult<Item> {
    let household_id = household::resolve_household(pool, user_id, None).await?;
    items::create_item(pool, &household_id, user_id, input)
        .await
        .map_err(|err| {
            err.with_context("operation", "create_item")
                .with_context("household_id", household_id.clone())
        })
}

/// Run shelf-photo analysis and feed the detections into ordinary batch
/// item creation.
pub async fn analyze_shelf_command(
    pool: &SqlitePool,
    analyzer: &dyn ShelfAnalyzer,
    user_id: &str,
    image_urls: Vec<String>,
) -> AppResult<Vec<Item>> {
    let household_id = household::resolve_household(pool, user_id, None).await?;
    let detected = analyzer.analyze_shelf(image_urls).await.map_err(|err| {
        err.with_context("operation", "analyze_shelf")
            .with_context("household_id", household_id.clone())
    })?;
    let inputs: Vec<NewItem> = detected
        .into_iter()
        .map(|detected| detected.into_new_item())
        .collect();
    items::create_items_batch(pool, &household_id, user_id, inputs)
        .await
        .map_err(|err| {
            err.with_context("operation", "analyze_shelf")
                .with_context("household_id", household_id.clone())
        })
}

pub async fn add_shopping_item_command(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    quantity: i64,
) -> AppResult<ShoppingItem> {
    let household_id = household::resolve_household(pool, user_id, None).await?;
    shopping::add_shopping_item(pool, &household_id, user_id, name, quantity)
        .await
        .map_err(|err| {
            err.with_context("operation", "add_shopping_item")
                .with_context("household_id", household_id.clone())
        })
}

pub async fn list_shopping_items_command(
    pool: &SqlitePool,
    user_id: &str,
) -> AppResult<Vec<ShoppingItem>> {
    let Some(household_id) = household::household_for_user(pool, user_id).await? else {
        return Ok(Vec::new());
    };
    shopping::list_shopping_items(pool, &household_id)
        .await
        .map_err(|err| {
            err.with_context("operation", "list_shopping_items")
                .with_context("household_id", household_id.clone())
        })
}
