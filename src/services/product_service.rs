use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest, ViewCount},
    entity::{
        CartItems, cart_items,
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel, ProductImages},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    product_query::ProductQuery,
    response::{ApiResponse, Meta},
    state::AppState,
};

const TITLE_TAKEN: &str = "Title already exists.";

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let total = query.filtered().count(&state.orm).await? as i64;

    let products: Vec<Product> = query
        .select()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(
        query.window.page as i64,
        query.window.limit as i64,
        total,
    );
    let data = ProductList {
        length: products.len(),
        products,
    };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let images = match payload.images {
        Some(images) if !images.is_empty() => images,
        _ => return Err(AppError::BadRequest("Empty image field!".to_string())),
    };
    validate_price(payload.price)?;
    if title_owner(state, &payload.title).await?.is_some() {
        return Err(AppError::BadRequest(TITLE_TAKEN.to_string()));
    }

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title),
        description: Set(payload.description),
        category: Set(payload.category),
        size: Set(payload.size),
        sleeve: Set(payload.sleeve),
        color: Set(payload.color),
        price: Set(payload.price),
        images: Set(ProductImages(images)),
        views: Set(0),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await.map_err(title_conflict)?;
    tracing::info!(product_id = %product.id, title = %product.title, "product created");

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Successfully created the product.",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Some(title) = payload.title.as_deref() {
        if title_owner(state, title).await?.is_some_and(|owner| owner != id) {
            return Err(AppError::BadRequest(TITLE_TAKEN.to_string()));
        }
    }

    let mut active: ActiveModel = existing.clone().into();
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(size) = payload.size {
        active.size = Set(size);
    }
    if let Some(sleeve) = payload.sleeve {
        active.sleeve = Set(sleeve);
    }
    if let Some(color) = payload.color {
        active.color = Set(color);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(images) = payload.images {
        if images.is_empty() {
            return Err(AppError::BadRequest("Empty image field!".to_string()));
        }
        active.images = Set(ProductImages(images));
    }

    let product = if active.is_changed() {
        active.update(&state.orm).await.map_err(title_conflict)?
    } else {
        existing
    };

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Successfully updated the product.",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Public and unauthenticated: every call counts, repeated fetches included.
pub async fn increment_views(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ViewCount>> {
    let views: Option<(i64,)> =
        sqlx::query_as("UPDATE products SET views = views + 1 WHERE id = $1 RETURNING views")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let (views,) = views.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Updated views.", ViewCount { views }, None))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let txn = state.orm.begin().await?;
    let cart = CartItems::delete_many()
        .filter(cart_items::Column::ProductId.eq(id))
        .exec(&txn)
        .await?;
    Products::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    // Images go only once the product is gone; a failed removal is logged, never retried.
    for image in &product.images.0 {
        if let Err(err) = state.images.destroy(&image.public_id).await {
            tracing::warn!(
                product_id = %id,
                public_id = %image.public_id,
                error = %err,
                "failed to delete product image"
            );
        }
    }
    tracing::info!(
        product_id = %id,
        cart_items_removed = cart.rows_affected,
        "product deleted"
    );

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id, "cart_items_removed": cart.rows_affected }),
    )
    .await;

    Ok(ApiResponse::success(
        "Successfully deleted the product.",
        serde_json::json!({ "cart_items_removed": cart.rows_affected }),
        Some(Meta::empty()),
    ))
}

async fn title_owner(state: &AppState, title: &str) -> AppResult<Option<Uuid>> {
    let owner = Products::find()
        .filter(Column::Title.eq(title))
        .one(&state.orm)
        .await?
        .map(|p| p.id);
    Ok(owner)
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }
    Ok(())
}

/// The unique index decides races the pre-check misses.
fn title_conflict(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::BadRequest(TITLE_TAKEN.to_string()),
        _ => AppError::OrmError(err),
    }
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        title: model.title,
        description: model.description,
        category: model.category,
        size: model.size,
        sleeve: model.sleeve,
        color: model.color,
        price: model.price,
        images: model.images.0,
        views: model.views,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
