use axum::{debug_handler, extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::AppResult;

use super::msg::{self, Message, NewMessage, UnreadCounts};

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkRead {
    pub reader_id: String,
    pub sender_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkedRead {
    pub updated: u64,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_message(
    State(db_pool): State<SqlitePool>,
    Json(new): Json<NewMessage>,
) -> AppResult<Json<Message>> {
    Ok(Json(msg::create(&db_pool, new).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn conversation(
    State(db_pool): State<SqlitePool>,
    Path((user_id, counterpart_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(msg::list_by_counterpart(&db_pool, &user_id, &counterpart_id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn mark_read(
    State(db_pool): State<SqlitePool>,
    Json(MarkRead { reader_id, sender_id }): Json<MarkRead>,
) -> AppResult<Json<MarkedRead>> {
    let updated = msg::mark_read_by_sender(&db_pool, &reader_id, &sender_id).await?;
    Ok(Json(MarkedRead { updated }))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn unread(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UnreadCounts>> {
    Ok(Json(msg::unread_counts_by_sender(&db_pool, &user_id).await?))
}
