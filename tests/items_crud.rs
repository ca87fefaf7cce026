use anyhow::Result;
use futures::future::{ready, BoxFuture};
use serde_json::json;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use larder_lib::external::{DetectedItem, ShelfAnalyzer};
use larder_lib::model::{ItemPatch, NewItem};
use larder_lib::{commands, household, items, locations, model, AppResult};

async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;
    larder_lib::migrate::apply_migrations(&pool).await?;
    Ok(pool)
}

#[tokio::test]
async fn create_validates_name_and_quantity() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;

    let err = items::create_item(&pool, &hh, "u1", NewItem::default())
        .await
        .expect_err("name is required");
    assert_eq!(err.code(), model::ITEMS_NAME_REQUIRED);

    let err = items::create_item(
        &pool,
        &hh,
        "u1",
        NewItem {
            name: "Milk".to_string(),
            quantity: Some(-3),
            ..NewItem::default()
        },
    )
    .await
    .expect_err("negative quantity is invalid");
    assert_eq!(err.code(), model::VALIDATION_QUANTITY_NEGATIVE);
    Ok(())
}

#[tokio::test]
async fn patch_updates_only_the_fields_it_names() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;
    let item = items::create_item(
        &pool,
        &hh,
        "u1",
        NewItem {
            name: "Pasta".to_string(),
            description: Some("500g fusilli".to_string()),
            quantity: Some(3),
            category: Some("dry goods".to_string()),
            ..NewItem::default()
        },
    )
    .await?;

    // quantity set, description explicitly cleared, category untouched.
    let patch: ItemPatch = serde_json::from_value(json!({
        "quantity": 5,
        "description": null
    }))?;
    items::update_item(&pool, &hh, &item.id, patch).await?;

    let stored = items::get_item(&pool, &hh, &item.id).await?.expect("item");
    assert_eq!(stored.quantity, 5);
    assert_eq!(stored.description, None);
    assert_eq!(stored.category.as_deref(), Some("dry goods"));
    assert_eq!(stored.name, "Pasta");
    Ok(())
}

#[tokio::test]
async fn an_empty_patch_is_a_no_op() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;
    let item = items::create_item(
        &pool,
        &hh,
        "u1",
        NewItem {
            name: "Tea".to_string(),
            ..NewItem::default()
        },
    )
    .await?;

    items::update_item(&pool, &hh, &item.id, ItemPatch::default()).await?;
    // Even against an id that does not exist.
    items::update_item(&pool, &hh, "no-such-item", ItemPatch::default()).await?;

    let stored = items::get_item(&pool, &hh, &item.id).await?.expect("item");
    assert_eq!(stored.updated_at, item.updated_at);
    Ok(())
}

#[tokio::test]
async fn updates_and_deletes_of_missing_items_error() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;

    let patch: ItemPatch = serde_json::from_value(json!({ "quantity": 1 }))?;
    let err = items::update_item(&pool, &hh, "ghost", patch)
        .await
        .expect_err("nothing to update");
    assert_eq!(err.code(), model::ITEMS_NOT_FOUND);

    let err = items::delete_item(&pool, &hh, "ghost")
        .await
        .expect_err("nothing to delete");
    assert_eq!(err.code(), model::ITEMS_NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn tags_round_trip_through_storage() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;
    let item = items::create_item(
        &pool,
        &hh,
        "u1",
        NewItem {
            name: "Cereal".to_string(),
            tags: vec!["breakfast".to_string(), "kids".to_string()],
            ..NewItem::default()
        },
    )
    .await?;

    let stored = items::get_item(&pool, &hh, &item.id).await?.expect("item");
    assert_eq!(stored.tags, vec!["breakfast", "kids"]);
    Ok(())
}

#[tokio::test]
async fn batch_create_rejects_foreign_containers_before_writing() -> Result<()> {
    let pool = memory_pool().await?;
    let ours = household::resolve_household(&pool, "owner", None).await?;
    let theirs = household::resolve_household(&pool, "neighbour", None).await?;
    let their_spot = locations::create_location(&pool, &theirs, "neighbour", "Garage").await?;
    let their_box =
        locations::create_container(&pool, &theirs, Some(&their_spot.id), "Toolbox", None).await?;

    let inputs = vec![
        NewItem {
            name: "Screws".to_string(),
            ..NewItem::default()
        },
        NewItem {
            name: "Drill".to_string(),
            container_id: Some(their_box.id.clone()),
            ..NewItem::default()
        },
    ];
    let err = items::create_items_batch(&pool, &ours, "owner", inputs)
        .await
        .expect_err("a foreign container must read as missing");
    assert_eq!(err.code(), model::CONTAINERS_NOT_FOUND);

    // Validation runs before the transaction opens, so the whole batch is dropped.
    assert!(items::list_items(&pool, &ours).await?.is_empty());
    Ok(())
}

struct StubAnalyzer;

impl ShelfAnalyzer for StubAnalyzer {
    fn analyze_shelf(
        &self,
        _image_urls: Vec<String>,
    ) -> BoxFuture<'static, AppResult<Vec<DetectedItem>>> {
        Box::pin(ready(Ok(vec![
            DetectedItem {
                name: "Tomato Soup".to_string(),
                quantity: 4,
                category: Some("tinned".to_string()),
            },
            DetectedItem {
                name: "Olive Oil".to_string(),
                quantity: 1,
                category: None,
            },
        ])))
    }
}

#[tokio::test]
async fn shelf_analysis_feeds_batch_item_creation() -> Result<()> {
    let pool = memory_pool().await?;

    let created =
        commands::analyze_shelf_command(&pool, &StubAnalyzer, "u1", vec!["photo://1".to_string()])
            .await?;
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].name, "Tomato Soup");
    assert_eq!(created[0].quantity, 4);
    assert_eq!(created[0].category.as_deref(), Some("tinned"));

    let hh = household::household_for_user(&pool, "u1").await?.expect("provisioned");
    let listed = items::list_items(&pool, &hh).await?;
    assert_eq!(listed.len(), 2);
    Ok(())
}
