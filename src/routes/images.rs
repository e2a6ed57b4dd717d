use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, post},
};

use crate::{
    dto::images::DestroyResult,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::ProductImage,
    response::ApiResponse,
    services::image_service,
    state::AppState,
};

const FILE_FIELD: &str = "file";

// Upload size is bounded by the global request body limit instead.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_image))
        .route("/{public_id}", delete(destroy_image))
        .layer(DefaultBodyLimit::disable())
}

#[utoipa::path(
    post,
    path = "/api/image",
    request_body(content_type = "multipart/form-data", description = "Image in the `file` field"),
    responses(
        (status = 200, description = "Stored image", body = ApiResponse<ProductImage>),
        (status = 400, description = "Missing file or unsupported type"),
        (status = 403, description = "Not an admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Images"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<ProductImage>>> {
    ensure_admin(&user)?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let resp = image_service::upload_image(&state, &user, bytes, &content_type).await?;
        return Ok(Json(resp));
    }
    Err(AppError::BadRequest(format!("missing `{FILE_FIELD}` field")))
}

#[utoipa::path(
    delete,
    path = "/api/image/{public_id}",
    params(
        ("public_id" = String, Path, description = "Identifier returned by upload")
    ),
    responses(
        (status = 200, description = "Deletion result", body = ApiResponse<DestroyResult>),
        (status = 400, description = "Malformed identifier"),
        (status = 403, description = "Not an admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Images"
)]
pub async fn destroy_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(public_id): Path<String>,
) -> AppResult<Json<ApiResponse<DestroyResult>>> {
    let resp = image_service::destroy_image(&state, &user, public_id).await?;
    Ok(Json(resp))
}
