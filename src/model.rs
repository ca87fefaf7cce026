use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

pub const AUTH_UNAUTHENTICATED: &str = "AUTH/UNAUTHENTICATED";
pub const HOUSEHOLD_PROVISIONING_FAILED: &str = "HOUSEHOLD/PROVISIONING_FAILED";
pub const HOUSEHOLD_NOT_FOUND: &str = "HOUSEHOLD/NOT_FOUND";
pub const INVITES_CODE_EXHAUSTED: &str = "INVITES/CODE_EXHAUSTED";
pub const INVITES_INVALID_EMAIL: &str = "INVITES/INVALID_EMAIL";
pub const INVITES_NOT_FOUND: &str = "INVITES/NOT_FOUND";
pub const ITEMS_NAME_REQUIRED: &str = "ITEMS/NAME_REQUIRED";
pub const ITEMS_NOT_FOUND: &str = "ITEMS/NOT_FOUND";
pub const LOCATIONS_NOT_FOUND: &str = "LOCATIONS/NOT_FOUND";
pub const LOCATIONS_NAME_REQUIRED: &str = "LOCATIONS/NAME_REQUIRED";
pub const CONTAINERS_NOT_FOUND: &str = "CONTAINERS/NOT_FOUND";
pub const SHOPPING_NOT_FOUND: &str = "SHOPPING/NOT_FOUND";
pub const SHOPPING_NAME_REQUIRED: &str = "SHOPPING/NAME_REQUIRED";
pub const VALIDATION_QUANTITY_NEGATIVE: &str = "VALIDATION/QUANTITY_NEGATIVE";

pub const INVITE_STATUS_PENDING: &str = "pending";
pub const INVITE_STATUS_ACCEPTED: &str = "accepted";
pub const INVITE_STATUS_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Household {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: String,
    pub household_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Container {
    pub id: String,
    pub household_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Raw `items` row; tags stay serialized until mapped into [`Item`].
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: String,
    pub household_id: String,
    pub user_id: Option<String>,
    pub location_id: Option<String>,
    pub container_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub quantity: i64,
    pub min_quantity: Option<i64>,
    pub expires_at: Option<i64>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub tags: String,
    pub is_favourite: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_confirmed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub household_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub is_favourite: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_confirmed_at: Option<i64>,
}

/// Stored tag payloads are JSON arrays; anything unreadable decodes as empty.
pub fn decode_tags(raw: &str) -> Vec<String> {
    match serde_json::from_str(raw) {
        Ok(tags) => tags,
        Err(err) => {
            tracing::warn!(target = "larder", event = "tags_decode_failed", error = %err);
            Vec::new()
        }
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        let tags = decode_tags(&row.tags);
        Item {
            id: row.id,
            household_id: row.household_id,
            user_id: row.user_id,
            location_id: row.location_id,
            container_id: row.container_id,
            name: row.name,
            description: row.description,
            photo_url: row.photo_url,
            thumbnail_url: row.thumbnail_url,
            quantity: row.quantity,
            min_quantity: row.min_quantity,
            expires_at: row.expires_at,
            category: row.category,
            notes: row.notes,
            tags,
            is_favourite: row.is_favourite,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_confirmed_at: row.last_confirmed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsumptionEntry {
    pub id: String,
    pub item_id: String,
    pub quantity_remaining: i64,
    pub consumed: i64,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: String,
    pub household_id: String,
    pub email: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShoppingItem {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub quantity: i64,
    pub purchased: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input shape for item creation (explicit add or shelf-analysis batch intake).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub min_quantity: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Partial item update. Outer `Option` = field present in the payload,
/// inner `Option` = value versus explicit null (clear).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub container_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub photo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail_url: Option<Option<String>>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_quantity: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expires_at: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_favourite: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_confirmed_at: Option<Option<i64>>,
}
