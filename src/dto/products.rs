use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Product, ProductImage};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub size: String,
    pub sleeve: String,
    pub color: String,
    #[serde(default)]
    pub price: i64,
    pub images: Option<Vec<ProductImage>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub size: Option<String>,
    pub sleeve: Option<String>,
    pub color: Option<String>,
    pub price: Option<i64>,
    pub images: Option<Vec<ProductImage>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    /// Number of products in this page.
    pub length: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewCount {
    pub views: i64,
}
