pub mod store;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{chat::{Hub, ServerEvent}, AppResult, AppState};

pub use store::Notification;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification {0} not found")]
    NotFound(String),
}

impl NotificationError {
    pub fn status(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications/{user_id}", get(list))
        .route("/notifications/read/{id}", post(mark_read))
}

/// Persists a notice for `user_id` and pushes it to their live connections.
/// Failures are logged, never propagated: a notice must not undo the change it reports.
pub async fn notify(db_pool: &SqlitePool, hub: &Hub, user_id: &str, kind: &str, body: &str) {
    match store::insert(db_pool, user_id, kind, body).await {
        Ok(notification) => hub.to_user(user_id, ServerEvent::Notification { notification }),
        Err(e) => tracing::warn!(%user_id, %kind, error = %e, "could not store notification"),
    }
}

#[debug_handler(state = AppState)]
async fn list(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(store::list(&db_pool, &user_id).await?))
}

#[debug_handler(state = AppState)]
async fn mark_read(
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Json<Notification>> {
    Ok(Json(store::mark_read(&db_pool, &id).await?))
}
