use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::{Message as WsMessage, WebSocket}, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::{broadcast::error::RecvError, mpsc, RwLock};
use uuid::Uuid;

use crate::AppResult;

use super::{msg, room, ChatError, ClientEvent, Hub, Membership, NewMessage, ServerEvent};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(
    State(db_pool): State<SqlitePool>,
    State(hub): State<Hub>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| connection(stream, db_pool, hub))
}

async fn connection(stream: WebSocket, db_pool: SqlitePool, hub: Hub) {
    let conn_id = Uuid::now_v7();
    let membership = Arc::new(RwLock::new(Membership::default()));
    let (mut sender, mut receiver) = stream.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerEvent>(16);
    let mut rx = hub.subscribe();
    tracing::debug!(%conn_id, "socket connected");

    let forward_membership = membership.clone();
    let mut forward_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(event) => event,
                    None => break,
                },
                published = rx.recv() => match published {
                    Ok(envelope) => {
                        if !forward_membership.read().await.reaches(conn_id, &envelope) {
                            continue;
                        }
                        envelope.event
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%conn_id, skipped, "connection fell behind, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "could not encode event");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = receiver.next().await {
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => handle(&db_pool, &hub, conn_id, &membership, event).await.err(),
            Err(e) => Some(ChatError::Validation(format!("malformed frame: {e}")).into()),
        };
        if let Some(e) = reply {
            tracing::debug!(%conn_id, error = %e, "rejected client frame");
            if reply_tx.send(ServerEvent::Error { message: e.to_string() }).await.is_err() {
                break;
            }
        }

        if forward_task.is_finished() {
            break;
        }
    }

    forward_task.abort();
    let _ = (&mut forward_task).await;

    leave(&hub, conn_id, &membership).await;
}

/// Drops the connection from presence and tells everyone who is still online.
async fn leave(hub: &Hub, conn_id: Uuid, membership: &RwLock<Membership>) {
    let user_id = membership.read().await.user_id.clone();
    if let Some(user_id) = user_id {
        let online = hub.presence().disconnect(&user_id).await;
        tracing::info!(%conn_id, %user_id, online = online.len(), "user left");
        hub.announce_online(online);
    }
}

fn joined(membership: &Membership) -> Result<String, ChatError> {
    membership.user_id.clone().ok_or(ChatError::NotJoined)
}

async fn handle(
    db_pool: &SqlitePool,
    hub: &Hub,
    conn_id: Uuid,
    membership: &RwLock<Membership>,
    event: ClientEvent,
) -> AppResult<()> {
    match event {
        ClientEvent::Join { user_id, role } => {
            {
                let mut membership = membership.write().await;
                if let Some(current) = &membership.user_id {
                    if *current == user_id {
                        return Ok(());
                    }
                    return Err(ChatError::Validation(format!("connection already joined as {current}")))?;
                }
                membership.user_id = Some(user_id.clone());
            }

            let online = hub.presence().connect(&user_id).await;
            tracing::info!(%conn_id, %user_id, ?role, online = online.len(), "user joined");
            hub.announce_online(online);
        }

        ClientEvent::JoinRoom { room_id } => {
            let mut membership = membership.write().await;
            let user_id = joined(&membership)?;
            if !room::participates(&room_id, &user_id) {
                return Err(ChatError::NotParticipant { user_id, room_id })?;
            }
            tracing::debug!(%conn_id, %user_id, %room_id, "joined room");
            membership.rooms.insert(room_id);
        }

        ClientEvent::LeaveRoom { room_id } => {
            membership.write().await.rooms.remove(&room_id);
        }

        ClientEvent::SendMessage { message } => {
            let user_id = joined(&*membership.read().await)?;
            if message.sender_id != user_id {
                return Err(ChatError::Validation(format!("{user_id} cannot send as {}", message.sender_id)))?;
            }

            // persisting again is a no-op for a message the client already stored
            let stored = msg::create(db_pool, NewMessage::from(message)).await?;
            let room_id = stored.room_id.clone();
            let receiver = stored.receiver_id.clone();
            hub.to_room(&room_id, Some(&receiver), Some(conn_id), ServerEvent::Message { message: stored });
        }

        ClientEvent::Typing { room_id } => {
            let user_id = joined(&*membership.read().await)?;
            if !room::participates(&room_id, &user_id) {
                return Err(ChatError::NotParticipant { user_id, room_id })?;
            }
            hub.to_room(&room_id, None, Some(conn_id), ServerEvent::Typing { room_id: room_id.clone(), user_id });
        }
    }

    Ok(())
}
