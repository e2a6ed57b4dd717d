use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub size: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItemDto>,
    pub length: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product: Product,
    pub size: String,
    pub quantity: i32,
    pub selected: bool,
}

/// Per-item changes keyed by cart item id; both maps are optional.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BulkCartUpdateRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub quantity: HashMap<Uuid, i32>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub selection: HashMap<Uuid, bool>,
}

#[derive(Debug, Default, Serialize, ToSchema, PartialEq, Eq)]
pub struct BulkCartUpdateResult {
    pub updated: u64,
    pub removed: u64,
    pub selected: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSelectionRequest {
    pub selected: bool,
}
