use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{db::now_millis, AppResult};

use super::NotificationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub body: String,
    pub read: bool,
    pub created_at: i64,
}

pub async fn insert(db_pool: &SqlitePool, user_id: &str, kind: &str, body: &str) -> AppResult<Notification> {
    let notification = Notification {
        id: Uuid::now_v7().to_string(),
        user_id: user_id.to_owned(),
        kind: kind.to_owned(),
        body: body.to_owned(),
        read: false,
        created_at: now_millis(),
    };

    sqlx::query("INSERT INTO notifications (id,user_id,kind,body,read,created_at) VALUES (?,?,?,?,?,?)")
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.body)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(db_pool)
        .await?;

    Ok(notification)
}

pub async fn list(db_pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Notification>> {
    Ok(
        sqlx::query_as("SELECT id,user_id,kind,body,read,created_at FROM notifications WHERE user_id=? ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(db_pool)
            .await?
    )
}

pub async fn mark_read(db_pool: &SqlitePool, id: &str) -> AppResult<Notification> {
    sqlx::query_as("UPDATE notifications SET read=1 WHERE id=? RETURNING id,user_id,kind,body,read,created_at")
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| NotificationError::NotFound(id.to_owned()).into())
}
