use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::AppResult;

use super::store::{self, NewService, Service};

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    category: Option<String>,
    provider_id: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    Json(new): Json<NewService>,
) -> AppResult<Json<Service>> {
    Ok(Json(store::create(&db_pool, new).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn get(
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Json<Service>> {
    Ok(Json(store::fetch(&db_pool, &id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    Query(ListQuery { category, provider_id }): Query<ListQuery>,
) -> AppResult<Json<Vec<Service>>> {
    Ok(Json(store::list(&db_pool, category.as_deref(), provider_id.as_deref()).await?))
}
