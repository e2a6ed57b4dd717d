use chrono::{DateTime, Utc};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::cart::{
        AddToCartRequest, BulkCartUpdateRequest, BulkCartUpdateResult, CartItemDto, CartList,
        UpdateQuantityRequest, UpdateSelectionRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product, ProductImage},
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    cart_size: String,
    quantity: i32,
    selected: bool,
    product_id: Uuid,
    title: String,
    description: Option<String>,
    category: String,
    size: String,
    sleeve: String,
    color: String,
    price: i64,
    images: Json<Vec<ProductImage>>,
    views: i64,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    item: CartItem,
    inserted: bool,
}

pub async fn list_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.size AS cart_size, ci.quantity, ci.selected,
               p.id AS product_id, p.title, p.description, p.category, p.size, p.sleeve,
               p.color, p.price, p.images, p.views, p.created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    let items: Vec<CartItemDto> = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.cart_id,
            product: Product {
                id: row.product_id,
                title: row.title,
                description: row.description,
                category: row.category,
                size: row.size,
                sleeve: row.sleeve,
                color: row.color,
                price: row.price,
                images: row.images.0,
                views: row.views,
                created_at: row.created_at,
            },
            size: row.cart_size,
            quantity: row.quantity,
            selected: row.selected,
        })
        .collect();

    let length = items.len();
    Ok(ApiResponse::success(
        "OK",
        CartList { items, length },
        Some(Meta::empty()),
    ))
}

/// Insert with quantity 1, or bump the existing (user, product, size) row by one.
pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let size = payload.size.trim();
    if size.is_empty() {
        return Err(AppError::BadRequest("size is required".to_string()));
    }

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::NotFound);
    }

    let row = sqlx::query_as::<_, UpsertRow>(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, size, quantity)
        VALUES ($1, $2, $3, $4, 1)
        ON CONFLICT (user_id, product_id, size)
        DO UPDATE SET quantity = cart_items.quantity + 1
        RETURNING id, user_id, product_id, size, quantity, selected, created_at,
                  (xmax = 0) AS inserted
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(size)
    .fetch_one(pool)
    .await?;

    let message = if row.inserted {
        "Added new cart item"
    } else {
        "Updated cart item"
    };
    tracing::debug!(
        user_id = %user.user_id,
        cart_item_id = %row.item.id,
        quantity = row.item.quantity,
        "{}",
        message
    );
    Ok(ApiResponse::success(message, row.item, None))
}

/// Applies every quantity and selection change in one transaction.
///
/// Ids that do not belong to the caller are skipped. A quantity of zero
/// removes the item.
pub async fn update_many(
    pool: &DbPool,
    user: &AuthUser,
    payload: BulkCartUpdateRequest,
) -> AppResult<ApiResponse<BulkCartUpdateResult>> {
    if let Some((id, qty)) = payload.quantity.iter().find(|(_, qty)| **qty < 0) {
        return Err(AppError::BadRequest(format!(
            "quantity for {id} must not be negative, got {qty}"
        )));
    }

    let mut result = BulkCartUpdateResult::default();
    let mut tx = pool.begin().await?;

    for (id, quantity) in &payload.quantity {
        if *quantity == 0 {
            let done = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user.user_id)
                .execute(&mut *tx)
                .await?;
            result.removed += done.rows_affected();
        } else {
            let done =
                sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user.user_id)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await?;
            result.updated += done.rows_affected();
        }
    }

    for (id, selected) in &payload.selection {
        let done = sqlx::query("UPDATE cart_items SET selected = $3 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.user_id)
            .bind(selected)
            .execute(&mut *tx)
            .await?;
        result.selected += done.rows_affected();
    }

    tx.commit().await?;

    Ok(ApiResponse::success(
        "Updated the cart item.",
        result,
        Some(Meta::empty()),
    ))
}

/// Sets one item's quantity; zero deletes the item instead.
pub async fn update_quantity(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateQuantityRequest,
) -> AppResult<ApiResponse<Option<CartItem>>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }

    if payload.quantity == 0 {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.user_id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        return Ok(ApiResponse::success("Removed the cart item.", None, None));
    }

    let item = sqlx::query_as::<_, CartItem>(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(payload.quantity)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Updated the cart item.", Some(item), None))
}

pub async fn update_selection(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateSelectionRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let item = sqlx::query_as::<_, CartItem>(
        "UPDATE cart_items SET selected = $3 WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.user_id)
    .bind(payload.selected)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Updated the cart item.", item, None))
}
