use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    db::{DbPool, OrmConn},
    middleware::auth::JwtKeys,
    storage::ImageStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub jwt: JwtKeys,
    pub images: Arc<dyn ImageStore>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
