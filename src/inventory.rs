use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::model::{Container, Item, ItemRow, Location};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct ContainerNode {
    pub container: Container,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationNode {
    pub location: Location,
    pub containers: Vec<ContainerNode>,
    pub direct_items: Vec<Item>,
}

/// Items and containers that hang off no known location.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnassignedBucket {
    pub containers: Vec<ContainerNode>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InventoryTree {
    pub locations: Vec<LocationNode>,
    pub unassigned: UnassignedBucket,
}

/// Reconstructs the location → container → item presentation tree from the
/// three flat collections. Pure: no storage access, re-run on every read.
///
/// Every input item lands in exactly one of: a container's item list, a
/// location's direct items, or the unassigned bucket. A container pointing
/// at an unknown location is dropped (should not happen when the household
/// invariants hold), but its items are kept in the unassigned bucket.
pub fn build_tree(
    locations: Vec<Location>,
    containers: Vec<Container>,
    items: Vec<Item>,
) -> InventoryTree {
    let mut container_items: HashMap<String, Vec<Item>> = containers
        .iter()
        .map(|c| (c.id.clone(), Vec::new()))
        .collect();
    let mut direct_items: HashMap<String, Vec<Item>> = locations
        .iter()
        .map(|l| (l.id.clone(), Vec::new()))
        .collect();
    let mut loose_items: Vec<Item> = Vec::new();

    for item in items {
        if let Some(container_id) = item.container_id.as_deref() {
            if let Some(list) = container_items.get_mut(container_id) {
                list.push(item);
                continue;
            }
            tracing::warn!(
                target = "larder",
                event = "item_container_missing",
                item_id = %item.id,
                container_id = %container_id,
            );
        }
        if let Some(location_id) = item.location_id.as_deref() {
            if let Some(list) = direct_items.get_mut(location_id) {
                list.push(item);
                continue;
            }
        }
        loose_items.push(item);
    }

    let mut containers_by_location: HashMap<String, Vec<ContainerNode>> = HashMap::new();
    let mut loose_containers: Vec<ContainerNode> = Vec::new();
    for container in containers {
        let items = container_items.remove(&container.id).unwrap_or_default();
        match container.location_id.as_deref() {
            Some(location_id) if direct_items.contains_key(location_id) => containers_by_location
                .entry(location_id.to_string())
                .or_default()
                .push(ContainerNode { container, items }),
            Some(location_id) => {
                tracing::warn!(
                    target = "larder",
                    event = "container_location_missing",
                    container_id = %container.id,
                    location_id = %location_id,
                );
                loose_items.extend(items);
            }
            None => loose_containers.push(ContainerNode { container, items }),
        }
    }

    let location_nodes = locations
        .into_iter()
        .map(|location| LocationNode {
            containers: containers_by_location
                .remove(&location.id)
                .unwrap_or_default(),
            direct_items: direct_items.remove(&location.id).unwrap_or_default(),
            location,
        })
        .collect();

    InventoryTree {
        locations: location_nodes,
        unassigned: UnassignedBucket {
            containers: loose_containers,
            items: loose_items,
        },
    }
}

/// Fan out the three flat reads for one household, then aggregate.
pub async fn tree_for_household(
    pool: &SqlitePool,
    household_id: &str,
) -> AppResult<InventoryTree> {
    let locations = sqlx::query_as::<_, Location>(
        "SELECT id, household_id, user_id, name, created_at, updated_at \
         FROM locations WHERE household_id = ? ORDER BY name, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;

    let containers = sqlx::query_as::<_, Container>(
        "SELECT id, household_id, location_id, name, photo_url, created_at, updated_at \
         FROM containers WHERE household_id = ? ORDER BY name, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;

    let items = sqlx::query_as::<_, ItemRow>(
        "SELECT id, household_id, user_id, location_id, container_id, name, description, \
                photo_url, thumbnail_url, quantity, min_quantity, expires_at, category, \
                notes, tags, is_favourite, created_at, updated_at, last_confirmed_at \
         FROM items WHERE household_id = ? ORDER BY name, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)?;

    Ok(build_tree(
        locations,
        containers,
        items.into_iter().map(Item::from).collect(),
    ))
}
