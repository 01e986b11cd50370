use serde::{Deserialize, Serialize};

use crate::{notifications::Notification, payments::AttemptState};

use super::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

/// Frames a client may send over the real-time channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Join { user_id: String, role: Role },
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    SendMessage { message: Message },
    Typing { room_id: String },
}

/// Frames the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    OnlineUsers { user_ids: Vec<String> },
    Message { message: Message },
    PaymentStatus { booking_id: String, state: AttemptState, message: String },
    Notification { notification: Notification },
    Typing { room_id: String, user_id: String },
    Error { message: String },
}
