use axum::body::Bytes;

use crate::{
    dto::images::DestroyResult,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::ProductImage,
    response::ApiResponse,
    state::AppState,
};

pub async fn upload_image(
    state: &AppState,
    user: &AuthUser,
    bytes: Bytes,
    content_type: &str,
) -> AppResult<ApiResponse<ProductImage>> {
    ensure_admin(user)?;
    let image = state.images.upload(bytes, content_type).await?;
    tracing::info!(public_id = %image.public_id, "image uploaded");
    Ok(ApiResponse::success("Image uploaded", image, None))
}

pub async fn destroy_image(
    state: &AppState,
    user: &AuthUser,
    public_id: String,
) -> AppResult<ApiResponse<DestroyResult>> {
    ensure_admin(user)?;
    let removed = state.images.destroy(&public_id).await?;
    Ok(ApiResponse::success(
        if removed { "Image deleted" } else { "Image not found" },
        DestroyResult { public_id, removed },
        None,
    ))
}
