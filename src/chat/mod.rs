mod events;
mod history;
mod hub;
pub mod msg;
mod presence;
pub mod room;
mod ws;

use axum::{http::StatusCode, routing::{get, post}, Router};
use thiserror::Error;

use crate::AppState;

pub use events::{ClientEvent, Role, ServerEvent};
pub use history::{MarkRead, MarkedRead};
pub use hub::{Audience, Envelope, Hub, Membership};
pub use msg::{Message, NewMessage, UnreadCounts, IMAGE_CAPTION};
pub use presence::Presence;
pub use room::room_id;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("join with a user id first")]
    NotJoined,

    #[error("{user_id} is not a participant of room {room_id}")]
    NotParticipant { user_id: String, room_id: String },
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::NotJoined => StatusCode::UNAUTHORIZED,
            ChatError::NotParticipant { .. } => StatusCode::FORBIDDEN,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/messages", post(history::create_message))
        .route("/chat/messages/{user_id}/{counterpart_id}", get(history::conversation))
        .route("/chat/read", post(history::mark_read))
        .route("/chat/unread/{user_id}", get(history::unread))
        .route("/ws", get(ws::chat_ws))
}
