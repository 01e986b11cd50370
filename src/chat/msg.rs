use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::{db::now_millis, AppResult};

use super::{room::room_id, ChatError};

/// Caption stored for an image sent without text.
pub const IMAGE_CAPTION: &str = "Image";

const MAX_TEXT_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub room_id: String,
    pub text: String,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub read: bool,
}

/// A message as a client submits it. The id is generated by the client and
/// doubles as the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewMessage {
    /// Checks the payload and fills in the room id and image caption.
    pub fn into_message(self, created_at: i64) -> Result<Message, ChatError> {
        let NewMessage { id, sender_id, receiver_id, room_id: claimed_room, text, image_url } = self;

        if id.trim().is_empty() {
            return Err(ChatError::Validation("message id is required".to_owned()));
        }
        if sender_id.is_empty() || receiver_id.is_empty() {
            return Err(ChatError::Validation("sender and receiver are required".to_owned()));
        }
        if sender_id == receiver_id {
            return Err(ChatError::Validation("cannot message yourself".to_owned()));
        }

        let room = room_id(&sender_id, &receiver_id);
        if let Some(claimed) = claimed_room {
            if claimed != room {
                return Err(ChatError::Validation(format!("room {claimed} does not belong to {sender_id} and {receiver_id}")));
            }
        }

        let text = text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty());
        let image_url = image_url.filter(|url| !url.trim().is_empty());
        let text = match (text, &image_url) {
            (Some(text), _) => text,
            (None, Some(_)) => IMAGE_CAPTION.to_owned(),
            (None, None) => return Err(ChatError::Validation("message needs text or an image".to_owned())),
        };
        if text.len() > MAX_TEXT_LEN {
            return Err(ChatError::Validation(format!("message longer than {MAX_TEXT_LEN} bytes")));
        }

        Ok(Message {
            id,
            sender_id,
            receiver_id,
            room_id: room,
            text,
            image_url,
            created_at,
            read: false,
        })
    }
}

impl From<Message> for NewMessage {
    fn from(message: Message) -> Self {
        NewMessage {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            room_id: Some(message.room_id),
            text: Some(message.text),
            image_url: message.image_url,
        }
    }
}

/// Unread messages addressed to one user, per sender.
///
/// `message_ids` lists the messages behind the counts so a client can tell a
/// live delivery of one of them from a new message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCounts {
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
    #[serde(default)]
    pub message_ids: Vec<String>,
}

const COLUMNS: &str = "id,sender_id,receiver_id,room_id,text,image_url,created_at,read";

/// Stores a message. Submitting an id twice returns the stored row instead of
/// creating a duplicate.
pub async fn create(db_pool: &SqlitePool, new: NewMessage) -> AppResult<Message> {
    let message = new.into_message(now_millis())?;

    let inserted = sqlx::query(&format!("INSERT OR IGNORE INTO messages ({COLUMNS}) VALUES (?,?,?,?,?,?,?,?)"))
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.room_id)
        .bind(&message.text)
        .bind(&message.image_url)
        .bind(message.created_at)
        .bind(message.read)
        .execute(db_pool)
        .await?
        .rows_affected();

    if inserted == 1 {
        tracing::debug!(message_id = %message.id, room_id = %message.room_id, "message stored");
        return Ok(message);
    }

    let stored = get(db_pool, &message.id)
        .await?
        .ok_or_else(|| ChatError::Validation(format!("message {} vanished", message.id)))?;
    if stored.sender_id != message.sender_id || stored.receiver_id != message.receiver_id {
        return Err(ChatError::Validation(format!("message id {} is already taken", message.id)))?;
    }
    tracing::debug!(message_id = %stored.id, "duplicate message submission");
    Ok(stored)
}

pub async fn get(db_pool: &SqlitePool, id: &str) -> AppResult<Option<Message>> {
    Ok(
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM messages WHERE id=?"))
            .bind(id)
            .fetch_optional(db_pool)
            .await?
    )
}

/// The whole conversation between `user_id` and `counterpart_id`, oldest first.
pub async fn list_by_counterpart(db_pool: &SqlitePool, user_id: &str, counterpart_id: &str) -> AppResult<Vec<Message>> {
    Ok(
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM messages WHERE room_id=? ORDER BY created_at ASC, id ASC"))
            .bind(room_id(user_id, counterpart_id))
            .fetch_all(db_pool)
            .await?
    )
}

/// Marks everything `sender_id` sent to `reader_id` as read; returns how many rows changed.
pub async fn mark_read_by_sender(db_pool: &SqlitePool, reader_id: &str, sender_id: &str) -> AppResult<u64> {
    let updated = sqlx::query("UPDATE messages SET read=1 WHERE receiver_id=? AND sender_id=? AND read=0")
        .bind(reader_id)
        .bind(sender_id)
        .execute(db_pool)
        .await?
        .rows_affected();

    tracing::debug!(%reader_id, %sender_id, updated, "messages marked read");
    Ok(updated)
}

pub async fn unread_counts_by_sender(db_pool: &SqlitePool, user_id: &str) -> AppResult<UnreadCounts> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, sender_id FROM messages WHERE receiver_id=? AND read=0 ORDER BY created_at, id",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    let mut unread = UnreadCounts::default();
    for (id, sender_id) in rows {
        *unread.counts.entry(sender_id).or_default() += 1;
        unread.total += 1;
        unread.message_ids.push(id);
    }
    Ok(unread)
}
