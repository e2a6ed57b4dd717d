use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct DestroyResult {
    pub public_id: String,
    pub removed: bool,
}
