use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use larder_lib::model::NewItem;
use larder_lib::{commands, household, inventory, items, locations};

async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;
    larder_lib::migrate::apply_migrations(&pool).await?;
    Ok(pool)
}

fn new_item(name: &str, location_id: Option<&str>, container_id: Option<&str>) -> NewItem {
    NewItem {
        name: name.to_string(),
        location_id: location_id.map(str::to_string),
        container_id: container_id.map(str::to_string),
        quantity: Some(1),
        ..NewItem::default()
    }
}

fn all_item_names(tree: &inventory::InventoryTree) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for node in &tree.locations {
        for c in &node.containers {
            names.extend(c.items.iter().map(|i| i.name.clone()));
        }
        names.extend(node.direct_items.iter().map(|i| i.name.clone()));
    }
    for c in &tree.unassigned.containers {
        names.extend(c.items.iter().map(|i| i.name.clone()));
    }
    names.extend(tree.unassigned.items.iter().map(|i| i.name.clone()));
    names.sort();
    names
}

#[tokio::test]
async fn tree_reflects_the_stored_hierarchy() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;

    let kitchen = locations::create_location(&pool, &hh, "u1", "Kitchen").await?;
    let shelf =
        locations::create_container(&pool, &hh, Some(&kitchen.id), "Top Shelf", None).await?;

    items::create_item(&pool, &hh, "u1", new_item("Oats", Some(&kitchen.id), Some(&shelf.id)))
        .await?;
    items::create_item(&pool, &hh, "u1", new_item("Bananas", Some(&kitchen.id), None)).await?;
    items::create_item(&pool, &hh, "u1", new_item("Batteries", None, None)).await?;

    let tree = inventory::tree_for_household(&pool, &hh).await?;
    assert_eq!(tree.locations.len(), 1);
    let node = &tree.locations[0];
    assert_eq!(node.location.name, "Kitchen");
    assert_eq!(node.containers.len(), 1);
    assert_eq!(node.containers[0].items[0].name, "Oats");
    assert_eq!(node.direct_items[0].name, "Bananas");
    assert_eq!(tree.unassigned.items[0].name, "Batteries");
    Ok(())
}

#[tokio::test]
async fn tree_is_isolated_per_household() -> Result<()> {
    let pool = memory_pool().await?;
    let ours = household::resolve_household(&pool, "owner", None).await?;
    let theirs = household::resolve_household(&pool, "neighbour", None).await?;
    assert_ne!(ours, theirs);

    items::create_item(&pool, &ours, "owner", new_item("Coffee", None, None)).await?;
    items::create_item(&pool, &theirs, "neighbour", new_item("Tea", None, None)).await?;

    let our_tree = commands::inventory_tree_command(&pool, "owner").await?;
    assert_eq!(all_item_names(&our_tree), vec!["Coffee"]);

    let their_tree = commands::inventory_tree_command(&pool, "neighbour").await?;
    assert_eq!(all_item_names(&their_tree), vec!["Tea"]);
    Ok(())
}

#[tokio::test]
async fn unknown_user_sees_an_empty_tree() -> Result<()> {
    let pool = memory_pool().await?;
    let tree = commands::inventory_tree_command(&pool, "nobody").await?;
    assert!(tree.locations.is_empty());
    assert!(tree.unassigned.containers.is_empty());
    assert!(tree.unassigned.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_a_location_moves_its_contents_to_unassigned() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;

    let pantry = locations::create_location(&pool, &hh, "u1", "Pantry").await?;
    let basket =
        locations::create_container(&pool, &hh, Some(&pantry.id), "Basket", None).await?;
    items::create_item(&pool, &hh, "u1", new_item("Rice", Some(&pantry.id), Some(&basket.id)))
        .await?;
    items::create_item(&pool, &hh, "u1", new_item("Flour", Some(&pantry.id), None)).await?;

    locations::delete_location(&pool, &hh, &pantry.id).await?;

    let tree = inventory::tree_for_household(&pool, &hh).await?;
    assert!(tree.locations.is_empty());
    // The basket survives with its contents, location cleared by the FK.
    assert_eq!(tree.unassigned.containers.len(), 1);
    assert_eq!(tree.unassigned.containers[0].items[0].name, "Rice");
    assert_eq!(tree.unassigned.items[0].name, "Flour");
    assert_eq!(all_item_names(&tree), vec!["Flour", "Rice"]);
    Ok(())
}

#[tokio::test]
async fn deleting_a_container_keeps_items_at_the_location() -> Result<()> {
    let pool = memory_pool().await?;
    let hh = household::resolve_household(&pool, "u1", None).await?;

    let fridge = locations::create_location(&pool, &hh, "u1", "Fridge").await?;
    let drawer =
        locations::create_container(&pool, &hh, Some(&fridge.id), "Drawer", None).await?;
    items::create_item(&pool, &hh, "u1", new_item("Cheese", Some(&fridge.id), Some(&drawer.id)))
        .await?;

    locations::delete_container(&pool, &hh, &drawer.id).await?;

    let tree = inventory::tree_for_household(&pool, &hh).await?;
    assert!(tree.locations[0].containers.is_empty());
    assert_eq!(tree.locations[0].direct_items[0].name, "Cheese");
    Ok(())
}

#[tokio::test]
async fn creating_an_item_against_a_foreign_location_fails_as_not_found() -> Result<()> {
    let pool = memory_pool().await?;
    let ours = household::resolve_household(&pool, "owner", None).await?;
    let theirs = household::resolve_household(&pool, "neighbour", None).await?;
    let their_spot = locations::create_location(&pool, &theirs, "neighbour", "Garage").await?;

    let err = items::create_item(
        &pool,
        &ours,
        "owner",
        new_item("Drill", Some(&their_spot.id), None),
    )
    .await
    .expect_err("foreign location must read as missing");
    assert_eq!(err.code(), larder_lib::model::LOCATIONS_NOT_FOUND);
    Ok(())
}
